use std::fmt;

use conveyor_core::{AckHandle, LifecycleSignal};

/// Events the delivery subsystem feeds into the mediator bridge.
///
/// A closed set, processed by an exhaustive match on a single task -- the
/// actor-mailbox pattern with the dynamic dispatch replaced by a sum type.
pub enum StreamEvent {
    /// A producer lifecycle boundary. `StreamInit` makes the bridge grant
    /// the initial unit of credit; `StreamFinished` makes it notify the
    /// consumer, return the final credit, and stop.
    Lifecycle(LifecycleSignal),
    /// One delivered item awaiting an acknowledgment decision.
    Item(Box<dyn AckHandle>),
    /// The stream failed upstream. Logged; delivery may still resume.
    Failed(String),
}

impl fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(signal) => f.debug_tuple("Lifecycle").field(signal).finish(),
            Self::Item(handle) => f
                .debug_tuple("Item")
                .field(&handle.delivery_tag())
                .finish(),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// One unit of delivery credit.
///
/// The producer must hold a credit before delivering an item and the
/// bridge returns it only once the previous item has received its
/// acknowledgment decision. This bounds in-flight work to exactly one
/// item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credit;
