use crate::registry::ResourceRecord;
use crate::time::Timestamp;
use crate::wire::event::Event;

/// Timeline event filters.
///
/// Size filters let events without a size through (frees, context and info
/// records), time filters let events without a timestamp through.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Filter {
    MinSize(u64),
    MaxSize(u64),
    MinTime(Timestamp),
    MaxTime(Timestamp),
}

impl Filter {
    pub fn matches(&self, event: &Event) -> bool {
        self.check(event.size(), event.timestamp())
    }

    /// Records are matched on their size and allocation time
    pub fn matches_record(&self, record: &ResourceRecord) -> bool {
        self.check(Some(record.size), Some(record.allocated_at))
    }

    fn check(&self, size: Option<u64>, timestamp: Option<Timestamp>) -> bool {
        match (self, size, timestamp) {
            (Filter::MinSize(min), Some(size), _) => size >= *min,
            (Filter::MaxSize(max), Some(size), _) => size <= *max,
            (Filter::MinTime(min), _, Some(ts)) => ts >= *min,
            (Filter::MaxTime(max), _, Some(ts)) => ts <= *max,
            _ => true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{ContextRef, Ordinal, ResourceId};
    use crate::wire::event::{AllocEvent, FreeEvent};

    #[test]
    fn sizeless_events_pass_size_filters() {
        let alloc = Event::Alloc(AllocEvent {
            ordinal: Ordinal(1),
            timestamp: Timestamp(100),
            id: ResourceId(0x10),
            size: 32,
            context: ContextRef::NONE,
        });
        let free = Event::Free(FreeEvent {
            ordinal: Ordinal(2),
            timestamp: Timestamp(200),
            id: ResourceId(0x10),
            context: ContextRef::NONE,
        });

        assert!(Filter::MinSize(32).matches(&alloc));
        assert!(!Filter::MinSize(33).matches(&alloc));
        assert!(!Filter::MaxSize(31).matches(&alloc));
        assert!(Filter::MinSize(1000).matches(&free));

        assert!(Filter::MinTime(Timestamp(150)).matches(&free));
        assert!(!Filter::MinTime(Timestamp(150)).matches(&alloc));
        assert!(!Filter::MaxTime(Timestamp(150)).matches(&free));
    }
}
