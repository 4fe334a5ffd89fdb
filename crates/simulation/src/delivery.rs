use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

use conveyor_core::{AckDecision, AckError, AckHandle};

/// One in-memory delivery: the payload plus the channel the decision comes
/// back to the broker on.
///
/// The `AckHandle` contract (exactly one decision, enforced by the
/// `self: Box<Self>` receivers) maps here to exactly one send on the
/// decision channel.
pub struct QueueDelivery {
    payload: Bytes,
    delivery_tag: u64,
    decisions: UnboundedSender<(u64, AckDecision)>,
}

impl QueueDelivery {
    pub(crate) fn new(
        payload: Bytes,
        delivery_tag: u64,
        decisions: UnboundedSender<(u64, AckDecision)>,
    ) -> Self {
        Self {
            payload,
            delivery_tag,
            decisions,
        }
    }

    fn decide(self: Box<Self>, decision: AckDecision) -> Result<(), AckError> {
        self.decisions
            .send((self.delivery_tag, decision))
            .map_err(|_| AckError::ChannelClosed)
    }
}

#[async_trait]
impl AckHandle for QueueDelivery {
    fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    async fn acknowledge(self: Box<Self>) -> Result<(), AckError> {
        self.decide(AckDecision::Acknowledge)
    }

    async fn reject(self: Box<Self>) -> Result<(), AckError> {
        self.decide(AckDecision::Reject)
    }
}
