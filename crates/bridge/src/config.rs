use std::time::Duration;

/// Configuration for the [`MediatorBridge`](crate::MediatorBridge).
///
/// Controls the per-item response budget, the delivery-guarantee variant of
/// the underlying transport, and how rejections are handled when the
/// transport has already auto-acknowledged.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum wall-clock time to wait for the consumer's reply to a single
    /// item. An overdue reply is treated as a rejection so the item is
    /// redelivered rather than silently lost.
    pub reply_timeout: Duration,
    /// Delivery guarantee of the underlying transport.
    pub delivery_mode: DeliveryMode,
    /// How a rejection is handled under [`DeliveryMode::AtMostOnce`].
    /// Ignored under at-least-once.
    pub nack_policy: NackPolicy,
    /// Whether to notify the consumer when the stream finishes.
    pub forward_end_of_stream: bool,
    /// Capacity of the inbound event channel.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(500),
            delivery_mode: DeliveryMode::AtLeastOnce,
            nack_policy: NackPolicy::default(),
            forward_end_of_stream: true,
            event_capacity: 4,
        }
    }
}

/// Delivery guarantee of the underlying transport, selected per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The transport auto-acknowledges on read. A failure after delivery
    /// causes loss, not redelivery.
    AtMostOnce,
    /// The transport holds redelivery responsibility until an explicit
    /// acknowledge or reject arrives. Consumers must tolerate duplicates.
    AtLeastOnce,
}

/// What to do with a rejection when the transport auto-acknowledged on read
/// and a reject can no longer cause a redelivery.
///
/// Converting such rejections into acceptance matches what the transport
/// already did, but it amounts to accepting data loss at the boundary, so
/// the conversion is explicit and configurable rather than silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NackPolicy {
    /// Log a warning and acknowledge; matches the transport's auto-ack
    /// reality. The loss is traced, never silent.
    #[default]
    WarnAndAccept,
    /// Forward the reject to the transport anyway so the loss is visible
    /// at the transport, even though no redelivery will happen.
    Forward,
}
