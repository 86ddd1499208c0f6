use crate::types::{ContextRef, Ordinal};
use derive_more::Display;

/// A call-context definition: the return addresses recorded for a
/// context reference, innermost frame first.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "{context}:{}", "self.frames.len()")]
pub struct ContextEvent {
    pub ordinal: Ordinal,

    pub context: ContextRef,
    pub frames: Vec<u64>,
}

impl ContextEvent {
    /// Context reference and frame count
    pub const MIN_WIRE_SIZE: usize = 8;
    pub const FRAME_WIRE_SIZE: usize = 8;
}
