use crate::time::Timestamp;
use crate::types::{ContextRef, Ordinal, ResourceId};
use derive_more::Display;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "[{timestamp}]:{id}:{size}:{context}")]
pub struct AllocEvent {
    pub ordinal: Ordinal,
    pub timestamp: Timestamp,

    pub id: ResourceId,
    pub size: u64,
    pub context: ContextRef,
}

impl AllocEvent {
    pub const WIRE_SIZE: usize = 24;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "[{timestamp}]:{id}:{context}")]
pub struct FreeEvent {
    pub ordinal: Ordinal,
    pub timestamp: Timestamp,

    pub id: ResourceId,
    pub context: ContextRef,
}

impl FreeEvent {
    pub const WIRE_SIZE: usize = 16;
}
