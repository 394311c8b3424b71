use std::sync::atomic::{AtomicU64, Ordering};

/// A process-unique identifier for a node in a graph description
///
/// Identifiers are stable across recompiles: a node that keeps its id across
/// a topology update also keeps its render state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new identifier that has not been used in this process
    pub fn generate() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value of this identifier
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
