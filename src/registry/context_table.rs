use crate::types::ContextRef;
use std::collections::BTreeMap;

/// Call-context definitions seen in the trace, keyed by reference.
///
/// The frames are raw return addresses; resolving them to symbols is left
/// to the caller.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct ContextTable(BTreeMap<ContextRef, Vec<u64>>);

impl ContextTable {
    pub fn frames(&self, context: ContextRef) -> Option<&[u64]> {
        self.0.get(&context).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContextRef, &Vec<u64>)> {
        self.0.iter()
    }

    /// Returns true if an earlier definition was replaced
    pub(crate) fn insert(&mut self, context: ContextRef, frames: Vec<u64>) -> bool {
        self.0.insert(context, frames).is_some()
    }
}
