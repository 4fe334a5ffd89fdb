use async_trait::async_trait;
use bytes::Bytes;
use conveyor_core::ConsumerOutcome;

/// Strongly-typed consumer trait with native `async fn`.
///
/// This trait is **not** object-safe because it uses native `async fn`
/// methods (which desugar to opaque `impl Future` return types). If you
/// need dynamic dispatch, use [`DynConsumerPort`] instead -- every
/// `ConsumerPort` automatically implements `DynConsumerPort` via a blanket
/// implementation.
///
/// The response budget is owned by the bridge, not the consumer: `process`
/// may take as long as it likes, and the bridge converts an overdue reply
/// into a [`ConsumerOutcome::TimedOut`].
pub trait ConsumerPort: Send + Sync {
    /// Returns the unique name of this consumer.
    fn name(&self) -> &str;

    /// Process one raw delivery payload and report the outcome.
    ///
    /// Implementations must fail closed: a malformed payload is a
    /// `Rejected` outcome, never a panic.
    fn process(
        &self,
        payload: Bytes,
    ) -> impl std::future::Future<Output = ConsumerOutcome> + Send;

    /// Invoked once when the delivery stream finishes, after any in-flight
    /// item has been decided. The default implementation does nothing.
    fn on_stream_end(&self) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// Object-safe consumer trait for use behind `Arc<dyn DynConsumerPort>`.
///
/// Uses [`macro@async_trait`] to enable dynamic dispatch of async methods.
/// You generally should not implement this trait directly -- instead
/// implement [`ConsumerPort`] and rely on the blanket implementation.
#[async_trait]
pub trait DynConsumerPort: Send + Sync {
    /// Returns the unique name of this consumer.
    fn name(&self) -> &str;

    /// Process one raw delivery payload and report the outcome.
    async fn process(&self, payload: Bytes) -> ConsumerOutcome;

    /// Invoked once when the delivery stream finishes.
    async fn on_stream_end(&self) {}
}

/// Blanket implementation: any type that implements [`ConsumerPort`] also
/// implements [`DynConsumerPort`], bridging the static and dynamic dispatch
/// worlds.
#[async_trait]
impl<T: ConsumerPort + Sync> DynConsumerPort for T {
    fn name(&self) -> &str {
        ConsumerPort::name(self)
    }

    async fn process(&self, payload: Bytes) -> ConsumerOutcome {
        ConsumerPort::process(self, payload).await
    }

    async fn on_stream_end(&self) {
        ConsumerPort::on_stream_end(self).await;
    }
}
