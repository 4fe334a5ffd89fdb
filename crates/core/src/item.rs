use std::fmt;

use serde::{Deserialize, Serialize};

/// A decoded unit of work: a booking identified by a numeric id.
///
/// Immutable once constructed. Created by a [`PayloadCodec`](crate::PayloadCodec)
/// from a raw delivery payload, processed exactly once by the consumer, then
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    id: u64,
}

impl WorkItem {
    /// Create a work item for the given booking id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// The booking id carried by this item.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Booking[{:03}]", self.id)
    }
}
