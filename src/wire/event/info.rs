use crate::types::Ordinal;
use derive_more::Display;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "{key}={value}")]
pub struct InfoEvent {
    pub ordinal: Ordinal,

    pub key: String,
    pub value: String,
}

impl InfoEvent {
    /// Both length prefixes
    pub const MIN_WIRE_SIZE: usize = 4;
}
