use thiserror::Error;

use crate::ack::AckError;

/// Top-level error type for the delivery pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The producer delivered a second item before credit for the previous
    /// one was returned. Fatal: the producer/bridge contract is broken and
    /// continuing could silently drop an item.
    #[error("protocol violation: delivery {delivery_tag} arrived while another item was in flight")]
    ProtocolViolation { delivery_tag: u64 },

    /// The consumer mailbox is gone and can accept no further requests.
    #[error("consumer mailbox closed")]
    ConsumerUnavailable,

    /// A decision could not be reported back to the transport.
    #[error("acknowledgment failed: {0}")]
    Ack(#[from] AckError),
}
