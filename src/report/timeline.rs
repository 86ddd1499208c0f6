use crate::processor::Summary;
use crate::registry::{Anomaly, ResourceRecord, Transition};
use crate::report::{Control, Filter, ReportGenerator};
use crate::time::Timestamp;
use crate::types::{ContextRef, Ordinal};
use crate::wire::event::{AllocEvent, Event, FreeEvent};
use std::io::{self, Write};

/// One line of the timeline
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TimelineEntry {
    Alloc {
        event: AllocEvent,
        /// Allocation this one displaced, the identifier was still live
        overwrites: Option<Ordinal>,
        /// Dropped by the registry
        rejected: bool,
    },
    Free {
        event: FreeEvent,
        /// `None` marks an unmatched free
        allocation: Option<ResourceRecord>,
    },
    Context {
        ordinal: Ordinal,
        context: ContextRef,
        frames: usize,
    },
    Info {
        ordinal: Ordinal,
        key: String,
        value: String,
    },
    /// Freed before the report was registered
    Closed(ResourceRecord),
    Leaked(ResourceRecord),
}

impl TimelineEntry {
    pub fn ordinal(&self) -> Ordinal {
        match self {
            TimelineEntry::Alloc { event, .. } => event.ordinal,
            TimelineEntry::Free { event, .. } => event.ordinal,
            TimelineEntry::Context { ordinal, .. } | TimelineEntry::Info { ordinal, .. } => {
                *ordinal
            }
            TimelineEntry::Closed(r) | TimelineEntry::Leaked(r) => r.allocated,
        }
    }

    pub fn is_unmatched_free(&self) -> bool {
        matches!(
            self,
            TimelineEntry::Free {
                allocation: None,
                ..
            }
        )
    }

    fn write<W: Write>(&self, out: &mut W, end_of_trace: Timestamp) -> io::Result<()> {
        match self {
            TimelineEntry::Alloc {
                event,
                overwrites,
                rejected,
            } => {
                write!(
                    out,
                    "{:>8} {} alloc  {} size={} ctx={}",
                    event.ordinal.get_raw(),
                    event.timestamp,
                    event.id,
                    event.size,
                    event.context
                )?;
                if let Some(prev) = overwrites {
                    write!(out, " overwritten=#{prev}")?;
                }
                if *rejected {
                    write!(out, " rejected")?;
                }
                writeln!(out)
            }
            TimelineEntry::Free { event, allocation } => {
                write!(
                    out,
                    "{:>8} {} free   {} ctx={}",
                    event.ordinal.get_raw(),
                    event.timestamp,
                    event.id,
                    event.context
                )?;
                match allocation {
                    Some(r) => writeln!(
                        out,
                        " size={} alloc=#{} duration={}",
                        r.size,
                        r.allocated,
                        r.duration(end_of_trace)
                    ),
                    None => writeln!(out, " unmatched"),
                }
            }
            TimelineEntry::Context {
                ordinal,
                context,
                frames,
            } => writeln!(
                out,
                "{:>8} context {context} frames={frames}",
                ordinal.get_raw()
            ),
            TimelineEntry::Info {
                ordinal,
                key,
                value,
            } => writeln!(out, "{:>8} info   {key}={value}", ordinal.get_raw()),
            TimelineEntry::Closed(r) => writeln!(
                out,
                "{:>8} {} closed {} size={} ctx={} free=#{} duration={}",
                r.allocated.get_raw(),
                r.allocated_at,
                r.id,
                r.size,
                r.context,
                r.freed.map(|o| o.get_raw()).unwrap_or_default(),
                r.duration(end_of_trace)
            ),
            TimelineEntry::Leaked(r) => writeln!(
                out,
                "{:>8} {} leak   {} size={} ctx={} duration={}",
                r.allocated.get_raw(),
                r.allocated_at,
                r.id,
                r.size,
                r.context,
                r.duration(end_of_trace)
            ),
        }
    }
}

/// Renders events, closed and leaked resources as ordinal-keyed lines
#[derive(Debug)]
pub struct TimelineReport<W: Write> {
    out: W,
    filters: Vec<Filter>,
    limit: Option<usize>,
    entries: Vec<TimelineEntry>,
}

impl<W: Write> TimelineReport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            filters: Vec::new(),
            limit: None,
            entries: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Stop taking events after `limit` lines
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn accepts(&self, event: &Event) -> bool {
        self.filters.iter().all(|f| f.matches(event))
    }

    fn accepts_record(&self, record: &ResourceRecord) -> bool {
        self.filters.iter().all(|f| f.matches_record(record))
    }

    fn is_full(&self) -> bool {
        self.limit.map_or(false, |l| self.entries.len() >= l)
    }
}

impl<W: Write> ReportGenerator for TimelineReport<W> {
    fn name(&self) -> &str {
        "timeline"
    }

    fn on_event(&mut self, event: &Event, transition: &Transition) -> Control {
        if !self.accepts(event) {
            return Control::Continue;
        }
        let entry = match event {
            Event::Alloc(e) => TimelineEntry::Alloc {
                event: *e,
                overwrites: match transition {
                    Transition::Replaced { previous, .. } => Some(previous.allocated),
                    _ => None,
                },
                rejected: matches!(
                    transition,
                    Transition::Rejected(Anomaly::MalformedSize { .. })
                ),
            },
            Event::Free(e) => TimelineEntry::Free {
                event: *e,
                allocation: match transition {
                    Transition::Freed(r) => Some(*r),
                    _ => None,
                },
            },
            Event::Context(e) => TimelineEntry::Context {
                ordinal: e.ordinal,
                context: e.context,
                frames: e.frames.len(),
            },
            Event::Info(e) => TimelineEntry::Info {
                ordinal: e.ordinal,
                key: e.key.clone(),
                value: e.value.clone(),
            },
        };
        self.entries.push(entry);
        if self.is_full() {
            Control::Stop
        } else {
            Control::Continue
        }
    }

    fn on_replayed(&mut self, record: &ResourceRecord) {
        if self.accepts_record(record) && !self.is_full() {
            self.entries.push(TimelineEntry::Closed(*record));
        }
    }

    fn on_leaked(&mut self, record: &ResourceRecord) {
        if self.accepts_record(record) && !self.is_full() {
            self.entries.push(TimelineEntry::Leaked(*record));
        }
    }

    fn finalize(&mut self, summary: &Summary<'_>) -> io::Result<()> {
        let end_of_trace = summary.stats.last_timestamp;
        for entry in &self.entries {
            entry.write(&mut self.out, end_of_trace)?;
        }
        let stats = summary.stats;
        writeln!(
            self.out,
            "# events: {}, leaked: {} ({} bytes), peak usage: {} bytes",
            stats.events_decoded, stats.leaked_count, stats.leaked_bytes, stats.usage.high_water_mark
        )?;
        writeln!(
            self.out,
            "# anomalies: {} ({})",
            stats.anomalies.total(),
            stats.anomalies
        )?;
        self.out.flush()
    }
}
