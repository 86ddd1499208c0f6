use crate::registry::{AnomalyCounts, ResourceRegistry};
use crate::time::Timestamp;
use crate::types::Usage;
use crate::wire::event::EventKind;
use crate::wire::HeaderInfo;
use std::collections::BTreeMap;

/// Counters gathered while processing a trace
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Stats {
    /// Set once the header record was read
    pub header: Option<HeaderInfo>,
    pub events: BTreeMap<EventKind, u64>,
    pub events_decoded: u64,
    /// Unknown and malformed records the decoder stepped over
    pub records_skipped: u64,
    pub anomalies: AnomalyCounts,
    pub leaked_count: u64,
    pub leaked_bytes: u64,
    pub usage: Usage,
    pub last_timestamp: Timestamp,
    /// The input ended part way through a record
    pub truncated: bool,
}

impl Stats {
    pub fn event_count(&self, kind: EventKind) -> u64 {
        self.events.get(&kind).copied().unwrap_or(0)
    }
}

/// What generators see when they are finalized
#[derive(Copy, Clone, Debug)]
pub struct Summary<'a> {
    pub stats: &'a Stats,
    pub registry: &'a ResourceRegistry,
}
