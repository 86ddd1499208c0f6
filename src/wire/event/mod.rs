use crate::time::Timestamp;
use crate::types::{ContextRef, Ordinal, ResourceId};
use crate::wire::RecordType;
use derive_more::Display;
use enum_iterator::Sequence;

pub use context::ContextEvent;
pub use info::InfoEvent;
pub use memory::{AllocEvent, FreeEvent};
pub use parser::EventParser;

pub mod context;
pub mod info;
pub mod memory;
pub mod parser;

/// The closed set of data record kinds
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Sequence)]
pub enum EventKind {
    #[display(fmt = "alloc")]
    Alloc,
    #[display(fmt = "free")]
    Free,
    #[display(fmt = "context")]
    Context,
    #[display(fmt = "info")]
    Info,
}

impl From<EventKind> for RecordType {
    fn from(k: EventKind) -> Self {
        match k {
            EventKind::Alloc => RecordType::Alloc,
            EventKind::Free => RecordType::Free,
            EventKind::Context => RecordType::Context,
            EventKind::Info => RecordType::Info,
        }
    }
}

/// A decoded trace record
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum Event {
    #[display(fmt = "Alloc({_0})")]
    Alloc(AllocEvent),
    #[display(fmt = "Free({_0})")]
    Free(FreeEvent),
    #[display(fmt = "Context({_0})")]
    Context(ContextEvent),
    #[display(fmt = "Info({_0})")]
    Info(InfoEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Alloc(_) => EventKind::Alloc,
            Event::Free(_) => EventKind::Free,
            Event::Context(_) => EventKind::Context,
            Event::Info(_) => EventKind::Info,
        }
    }

    /// Get the ordinal (sequence number) assigned by the decoder
    pub fn ordinal(&self) -> Ordinal {
        match self {
            Event::Alloc(e) => e.ordinal,
            Event::Free(e) => e.ordinal,
            Event::Context(e) => e.ordinal,
            Event::Info(e) => e.ordinal,
        }
    }

    /// Only resource calls carry a timestamp
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Event::Alloc(e) => Some(e.timestamp),
            Event::Free(e) => Some(e.timestamp),
            Event::Context(_) | Event::Info(_) => None,
        }
    }

    pub fn resource_id(&self) -> Option<ResourceId> {
        match self {
            Event::Alloc(e) => Some(e.id),
            Event::Free(e) => Some(e.id),
            Event::Context(_) | Event::Info(_) => None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            Event::Alloc(e) => Some(e.size),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<ContextRef> {
        match self {
            Event::Alloc(e) => Some(e.context),
            Event::Free(e) => Some(e.context),
            Event::Context(e) => Some(e.context),
            Event::Info(_) => None,
        }
    }
}
