use serde::{Deserialize, Serialize};

/// Result of handing one item to the consumer.
///
/// `Accepted` and `Rejected` come from the consumer itself. `TimedOut` is
/// synthesized by the mediator bridge when the reply deadline elapses; a
/// consumer crash mid-request surfaces as `Rejected` with a crash reason.
/// Either way an unanswered request is never dropped -- the bridge converts
/// it into a conservative rejection so the item is redelivered rather than
/// silently lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerOutcome {
    /// The item was processed successfully.
    Accepted,
    /// The consumer could not process the item.
    Rejected { reason: String },
    /// No reply arrived within the bridge's response budget.
    TimedOut,
}

impl ConsumerOutcome {
    /// Shorthand for a rejection with the given reason.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Whether this outcome represents successful processing.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
