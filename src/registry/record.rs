use crate::time::{Elapsed, Timestamp};
use crate::types::{ContextRef, Ordinal, ResourceId};
use crate::wire::event::AllocEvent;
use derive_more::Display;

/// Lifecycle state of a tracked resource.
///
/// `Unseen` is implicit (no record), `Freed` and `Leaked` are terminal.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum ResourceStatus {
    #[display(fmt = "live")]
    Live,
    #[display(fmt = "freed")]
    Freed,
    #[display(fmt = "leaked")]
    Leaked,
}

/// The registry's state for one resource
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(fmt = "{id}:{size}:{status}@{allocated}")]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub size: u64,
    /// Allocation context
    pub context: ContextRef,
    pub allocated: Ordinal,
    pub allocated_at: Timestamp,
    pub freed: Option<Ordinal>,
    pub freed_at: Option<Timestamp>,
    pub status: ResourceStatus,
}

impl ResourceRecord {
    pub(crate) fn open(e: &AllocEvent) -> Self {
        Self {
            id: e.id,
            size: e.size,
            context: e.context,
            allocated: e.ordinal,
            allocated_at: e.timestamp,
            freed: None,
            freed_at: None,
            status: ResourceStatus::Live,
        }
    }

    pub(crate) fn close(&mut self, ordinal: Ordinal, timestamp: Timestamp) {
        debug_assert_eq!(self.status, ResourceStatus::Live);
        self.freed = Some(ordinal);
        self.freed_at = Some(timestamp);
        self.status = ResourceStatus::Freed;
    }

    pub(crate) fn leak(&mut self) {
        debug_assert_eq!(self.status, ResourceStatus::Live);
        self.status = ResourceStatus::Leaked;
    }

    pub fn is_live(&self) -> bool {
        self.status == ResourceStatus::Live
    }

    /// One past the last byte, saturating at the top of the address space
    pub fn end(&self) -> u64 {
        self.id.0.saturating_add(self.size)
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.id.0 && addr < self.end()
    }

    /// Time from allocation until release, or until `end_of_trace` for
    /// resources that were never freed.
    pub fn duration(&self, end_of_trace: Timestamp) -> Elapsed {
        self.freed_at
            .unwrap_or(end_of_trace)
            .elapsed_since(self.allocated_at)
    }
}
