use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// A delivered payload coupled to exactly one pending acknowledgment
/// decision.
///
/// The decision methods consume the handle, so the type system enforces
/// that at most one of [`acknowledge`](AckHandle::acknowledge) /
/// [`reject`](AckHandle::reject) runs, at most once. Dropping a handle
/// without deciding stalls the producer's credit loop; the mediator bridge
/// guarantees every handle it receives is decided, even across consumer
/// timeouts and crashes.
#[async_trait]
pub trait AckHandle: Send {
    /// Raw payload carried by this delivery.
    fn payload(&self) -> Bytes;

    /// Transport-assigned tag identifying this delivery in logs.
    fn delivery_tag(&self) -> u64;

    /// Confirm successful processing to the delivery subsystem.
    async fn acknowledge(self: Box<Self>) -> Result<(), AckError>;

    /// Report failed processing. Under at-least-once delivery the item is
    /// redelivered; under at-most-once it is recorded as lost.
    async fn reject(self: Box<Self>) -> Result<(), AckError>;
}

/// The acknowledgment decision the bridge derives from a consumer outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Acknowledge,
    Reject,
}

/// Failure to deliver an acknowledgment decision back to the transport.
#[derive(Debug, Error)]
pub enum AckError {
    #[error("delivery channel closed before the decision was sent")]
    ChannelClosed,

    #[error("transport error: {0}")]
    Transport(String),
}
