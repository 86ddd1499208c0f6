//! Resource lifecycle tracking.
//!
//! The registry folds decoded events, in stream order, into the set of live
//! resources. It never reorders events: the ordinal of each transition is
//! the ordinal of the event that caused it.

use crate::config::{Config, Retention};
use crate::time::Timestamp;
use crate::types::{Ordinal, ResourceId, Usage};
use crate::wire::event::{AllocEvent, Event, FreeEvent};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

pub use anomaly::{Anomaly, AnomalyCounts};
pub use context_table::ContextTable;
pub use record::{ResourceRecord, ResourceStatus};

pub mod anomaly;
pub mod context_table;
pub mod record;

/// What applying one event did to the registry
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Transition {
    /// A new live record
    Allocated(ResourceRecord),
    /// The identifier was already live. The previous record is closed as
    /// leaked and replaced by the new one.
    Replaced {
        previous: ResourceRecord,
        current: ResourceRecord,
    },
    Freed(ResourceRecord),
    /// The event was dropped, state is unchanged
    Rejected(Anomaly),
    /// Context and info records don't touch resource state
    Untracked,
}

#[derive(Clone, Debug)]
pub struct ResourceRegistry {
    live: HashMap<ResourceId, ResourceRecord>,
    recently_closed: VecDeque<ResourceRecord>,
    retention: Retention,
    max_resource_size: u64,
    contexts: ContextTable,
    info: Vec<(String, String)>,
    usage: Usage,
    anomalies: AnomalyCounts,
    last_timestamp: Timestamp,
    flushed: bool,
}

impl ResourceRegistry {
    pub fn new(config: &Config) -> Self {
        Self {
            live: HashMap::new(),
            recently_closed: VecDeque::new(),
            retention: config.closed_retention,
            max_resource_size: config.max_resource_size,
            contexts: ContextTable::default(),
            info: Vec::new(),
            usage: Usage::default(),
            anomalies: AnomalyCounts::default(),
            last_timestamp: Timestamp::zero(),
            flushed: false,
        }
    }

    pub fn apply(&mut self, event: &Event) -> Transition {
        if let Some(ts) = event.timestamp() {
            self.last_timestamp = self.last_timestamp.max(ts);
        }
        match event {
            Event::Alloc(e) => self.allocate(e),
            Event::Free(e) => self.free(e),
            Event::Context(e) => {
                if self.contexts.insert(e.context, e.frames.clone()) {
                    debug!(context = %e.context, "Context redefined");
                }
                Transition::Untracked
            }
            Event::Info(e) => {
                self.info.push((e.key.clone(), e.value.clone()));
                Transition::Untracked
            }
        }
    }

    fn allocate(&mut self, e: &AllocEvent) -> Transition {
        if e.size > self.max_resource_size || e.id.0.checked_add(e.size).is_none() {
            return self.reject(Anomaly::MalformedSize {
                id: e.id,
                size: e.size,
                ordinal: e.ordinal,
            });
        }

        let current = ResourceRecord::open(e);
        self.usage.handle_alloc(current.size);
        match self.live.insert(e.id, current) {
            None => Transition::Allocated(current),
            Some(mut previous) => {
                let anomaly = Anomaly::DuplicateAlloc {
                    id: e.id,
                    ordinal: e.ordinal,
                    previous: previous.allocated,
                };
                warn!("{anomaly}");
                self.anomalies.record(&anomaly);
                self.usage.handle_free(previous.size);
                previous.leak();
                self.retain_closed(previous);
                Transition::Replaced { previous, current }
            }
        }
    }

    fn free(&mut self, e: &FreeEvent) -> Transition {
        match self.live.remove(&e.id) {
            Some(mut record) => {
                record.close(e.ordinal, e.timestamp);
                self.usage.handle_free(record.size);
                self.retain_closed(record);
                Transition::Freed(record)
            }
            None => self.reject(Anomaly::DanglingFree {
                id: e.id,
                ordinal: e.ordinal,
            }),
        }
    }

    fn reject(&mut self, anomaly: Anomaly) -> Transition {
        warn!("{anomaly}");
        self.anomalies.record(&anomaly);
        Transition::Rejected(anomaly)
    }

    fn retain_closed(&mut self, record: ResourceRecord) {
        if let Retention::Bounded(capacity) = self.retention {
            if capacity == 0 {
                return;
            }
            while self.recently_closed.len() >= capacity {
                self.recently_closed.pop_front();
            }
        }
        self.recently_closed.push_back(record);
    }

    /// Closes every remaining live record as leaked, in ascending allocation
    /// ordinal order. The recently-closed buffer is dropped as well, so a
    /// second call returns nothing.
    pub fn flush(&mut self) -> Vec<ResourceRecord> {
        let mut leaked: Vec<ResourceRecord> = self
            .live
            .drain()
            .map(|(_, mut record)| {
                record.leak();
                record
            })
            .collect();
        leaked.sort_unstable_by_key(|r| r.allocated);
        self.recently_closed.clear();
        if !self.flushed {
            debug!(leaked = leaked.len(), "Flushed registry");
        }
        self.flushed = true;
        leaked
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Owned copy of the current state, safe to hand to another thread
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            live: self.live_records(),
            recently_closed: self.recently_closed.iter().copied().collect(),
            usage: self.usage,
            anomalies: self.anomalies,
            last_timestamp: self.last_timestamp,
        }
    }

    /// Live records in allocation order
    pub fn live_records(&self) -> Vec<ResourceRecord> {
        let mut live: Vec<ResourceRecord> = self.live.values().copied().collect();
        live.sort_unstable_by_key(|r| r.allocated);
        live
    }

    pub fn live(&self, id: ResourceId) -> Option<&ResourceRecord> {
        self.live.get(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Closed records still held for late generators, oldest first
    pub fn recently_closed(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.recently_closed.iter()
    }

    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    /// Key/value metadata in stream order
    pub fn info(&self) -> &[(String, String)] {
        &self.info
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn anomalies(&self) -> AnomalyCounts {
        self.anomalies
    }

    /// Latest timestamp seen on any resource event
    pub fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }

    /// Ordinal of the oldest live allocation
    pub fn oldest_live(&self) -> Option<Ordinal> {
        self.live.values().map(|r| r.allocated).min()
    }
}

/// Immutable copy of the registry state
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct RegistrySnapshot {
    pub live: Vec<ResourceRecord>,
    pub recently_closed: Vec<ResourceRecord>,
    pub usage: Usage,
    pub anomalies: AnomalyCounts,
    pub last_timestamp: Timestamp,
}
