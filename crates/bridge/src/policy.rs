use conveyor_core::{AckDecision, ConsumerOutcome};

use crate::config::{DeliveryMode, NackPolicy};

/// Map a consumer outcome to an acknowledgment decision.
///
/// The whole delivery-guarantee distinction lives in this pure function:
///
/// * Under at-least-once, anything that is not an explicit accept is
///   rejected. The conservative default for an unanswered or unrecognized
///   outcome is reject, never acknowledge -- a spurious redelivery is
///   merely inefficient, a silent acknowledge risks data loss.
/// * Under at-most-once the transport already acknowledged on read, so a
///   reject cannot trigger a redelivery. [`NackPolicy::WarnAndAccept`]
///   mirrors that reality (the caller logs the warning);
///   [`NackPolicy::Forward`] sends the reject anyway so the loss shows up
///   at the transport.
#[must_use]
pub fn decide(mode: DeliveryMode, policy: NackPolicy, outcome: &ConsumerOutcome) -> AckDecision {
    match mode {
        DeliveryMode::AtLeastOnce => match outcome {
            ConsumerOutcome::Accepted => AckDecision::Acknowledge,
            ConsumerOutcome::Rejected { .. } | ConsumerOutcome::TimedOut => AckDecision::Reject,
        },
        DeliveryMode::AtMostOnce => match outcome {
            ConsumerOutcome::Accepted => AckDecision::Acknowledge,
            ConsumerOutcome::Rejected { .. } | ConsumerOutcome::TimedOut => match policy {
                NackPolicy::WarnAndAccept => AckDecision::Acknowledge,
                NackPolicy::Forward => AckDecision::Reject,
            },
        },
    }
}
