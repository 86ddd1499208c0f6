use crate::types::{Ordinal, ResourceId};
use derive_more::{Add, AddAssign, Display};

/// A non-fatal inconsistency in the resource state
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum Anomaly {
    #[display(fmt = "Free of {id} at {ordinal} has no matching allocation")]
    DanglingFree { id: ResourceId, ordinal: Ordinal },

    #[display(
        fmt = "Allocation of {id} at {ordinal} overwrites the live allocation from {previous}"
    )]
    DuplicateAlloc {
        id: ResourceId,
        ordinal: Ordinal,
        previous: Ordinal,
    },

    #[display(fmt = "Allocation of {id} at {ordinal} has an implausible size {size}")]
    MalformedSize {
        id: ResourceId,
        size: u64,
        ordinal: Ordinal,
    },
}

/// Per-category anomaly totals, covering both the registry and the decoder
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Add, AddAssign, Display)]
#[display(
    fmt = "dangling frees: {dangling_frees}, duplicate allocations: {duplicate_allocs}, \
           malformed sizes: {malformed_sizes}, unknown records: {unknown_records}, \
           malformed records: {malformed_records}, truncated records: {truncated_records}"
)]
pub struct AnomalyCounts {
    pub dangling_frees: u64,
    pub duplicate_allocs: u64,
    pub malformed_sizes: u64,
    pub unknown_records: u64,
    pub malformed_records: u64,
    pub truncated_records: u64,
}

impl AnomalyCounts {
    pub fn total(&self) -> u64 {
        self.dangling_frees
            + self.duplicate_allocs
            + self.malformed_sizes
            + self.unknown_records
            + self.malformed_records
            + self.truncated_records
    }

    pub(crate) fn record(&mut self, anomaly: &Anomaly) {
        match anomaly {
            Anomaly::DanglingFree { .. } => self.dangling_frees += 1,
            Anomaly::DuplicateAlloc { .. } => self.duplicate_allocs += 1,
            Anomaly::MalformedSize { .. } => self.malformed_sizes += 1,
        }
    }
}
