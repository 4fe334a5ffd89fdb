use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use conveyor_core::{AckDecision, AckHandle, ConsumerOutcome, LifecycleSignal, PipelineError};
use conveyor_consumer::ConsumerHandle;

use crate::config::{BridgeConfig, DeliveryMode, NackPolicy};
use crate::event::{Credit, StreamEvent};
use crate::policy::decide;

/// Backpressure state of the bridge. Exactly one item may be in flight at
/// any instant; a second delivery while `AwaitingReply` is a fatal
/// protocol violation.
#[derive(Debug, Clone, Copy)]
enum MediatorState {
    /// No item in flight; credit is (or is about to be) with the producer.
    Idle,
    /// One item is with the consumer, credit withheld.
    AwaitingReply { delivery_tag: u64, since: Instant },
}

/// Channel pair the delivery subsystem uses to talk to a spawned bridge.
///
/// The producer contract: hold one [`Credit`] before sending each
/// [`StreamEvent::Item`]; the bridge returns the credit once the item has
/// received its acknowledgment decision.
pub struct BridgeHandle {
    /// Inbound events (items and lifecycle signals).
    pub events: mpsc::Sender<StreamEvent>,
    /// Outbound credit grants.
    pub credits: mpsc::Receiver<Credit>,
}

/// Bridges a delivery stream that requires explicit per-item credit to a
/// consumer that answers requests asynchronously within a bounded timeout.
///
/// The bridge guarantees that every delivered item receives exactly one
/// acknowledgment decision -- on success, on rejection, on timeout, and
/// across consumer crashes -- and that credit is returned after each
/// decision so the pipeline can never deadlock on an unanswered request.
pub struct MediatorBridge {
    consumer: ConsumerHandle,
    config: BridgeConfig,
    events: mpsc::Receiver<StreamEvent>,
    credits: mpsc::Sender<Credit>,
    state: MediatorState,
}

impl MediatorBridge {
    /// Spawn the bridge task in front of the given consumer mailbox.
    ///
    /// The task resolves `Ok(())` when the stream finishes (or the event
    /// channel closes), and with an error on a fatal protocol violation.
    pub fn spawn(
        consumer: ConsumerHandle,
        config: BridgeConfig,
    ) -> (BridgeHandle, JoinHandle<Result<(), PipelineError>>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (credit_tx, credit_rx) = mpsc::channel(1);
        let bridge = Self {
            consumer,
            config,
            events: event_rx,
            credits: credit_tx,
            state: MediatorState::Idle,
        };
        let task = tokio::spawn(bridge.run());
        (
            BridgeHandle {
                events: event_tx,
                credits: credit_rx,
            },
            task,
        )
    }

    async fn run(mut self) -> Result<(), PipelineError> {
        loop {
            let Some(event) = self.events.recv().await else {
                debug!("event channel closed before the stream finished");
                return Ok(());
            };
            match event {
                StreamEvent::Lifecycle(LifecycleSignal::StreamInit) => {
                    info!("stream initialized");
                    self.grant_credit().await;
                }
                StreamEvent::Item(handle) => {
                    if self.on_item(handle).await? {
                        return Ok(());
                    }
                }
                StreamEvent::Lifecycle(LifecycleSignal::StreamFinished) => {
                    self.on_finished().await;
                    return Ok(());
                }
                StreamEvent::Failed(reason) => {
                    error!(%reason, "error in stream processing");
                }
            }
        }
    }

    /// Drive one item through the consumer and settle its acknowledgment.
    ///
    /// Returns `Ok(true)` when the stream ended while the item was in
    /// flight (the end-of-stream handling ran after the decision).
    async fn on_item(&mut self, handle: Box<dyn AckHandle>) -> Result<bool, PipelineError> {
        let tag = handle.delivery_tag();
        if let MediatorState::AwaitingReply {
            delivery_tag,
            since,
        } = self.state
        {
            error!(
                delivery_tag = tag,
                in_flight = delivery_tag,
                in_flight_for = ?since.elapsed(),
                "protocol violation: delivery while another item is in flight"
            );
            return Err(PipelineError::ProtocolViolation { delivery_tag: tag });
        }
        let since = Instant::now();
        self.state = MediatorState::AwaitingReply {
            delivery_tag: tag,
            since,
        };
        debug!(delivery_tag = tag, "item in flight");

        let mut reply = match self.consumer.request(handle.payload()).await {
            Ok(reply) => reply,
            Err(err) => {
                // The consumer subsystem is permanently gone. Still decide
                // the handle before aborting so the producer is not left
                // waiting on it.
                warn!(delivery_tag = tag, "consumer unavailable; rejecting in-flight item");
                let _ = handle.reject().await;
                return Err(err);
            }
        };

        let deadline = tokio::time::sleep(self.config.reply_timeout);
        tokio::pin!(deadline);

        let mut finish_pending = false;
        let mut stream_gone = false;
        let outcome = loop {
            tokio::select! {
                biased;
                reply = &mut reply => break match reply {
                    Ok(outcome) => outcome,
                    // Reply channel closed mid-request: the consumer task
                    // died. Fail closed so the item is redelivered.
                    Err(_) => ConsumerOutcome::rejected("consumer reply channel closed mid-request"),
                },
                event = self.events.recv() => match event {
                    Some(StreamEvent::Item(extra)) => {
                        let extra_tag = extra.delivery_tag();
                        error!(
                            delivery_tag = extra_tag,
                            in_flight = tag,
                            "protocol violation: delivery while awaiting a reply"
                        );
                        // Decide both handles before aborting so neither
                        // delivery is left dangling at the transport.
                        let _ = extra.reject().await;
                        let _ = handle.reject().await;
                        return Err(PipelineError::ProtocolViolation {
                            delivery_tag: extra_tag,
                        });
                    }
                    Some(StreamEvent::Lifecycle(LifecycleSignal::StreamFinished)) => {
                        finish_pending = true;
                    }
                    Some(StreamEvent::Lifecycle(LifecycleSignal::StreamInit)) => {
                        warn!("unexpected stream init while an item is in flight");
                    }
                    Some(StreamEvent::Failed(reason)) => {
                        error!(%reason, "error in stream processing");
                    }
                    None => stream_gone = true,
                },
                () = &mut deadline => break ConsumerOutcome::TimedOut,
            }
        };

        self.settle(handle, tag, since.elapsed(), &outcome).await?;
        self.state = MediatorState::Idle;
        self.grant_credit().await;

        if finish_pending {
            self.on_finished().await;
        }
        Ok(finish_pending || stream_gone)
    }

    /// Apply the ack decision policy and deliver exactly one decision for
    /// the handle.
    async fn settle(
        &self,
        handle: Box<dyn AckHandle>,
        tag: u64,
        elapsed: std::time::Duration,
        outcome: &ConsumerOutcome,
    ) -> Result<(), PipelineError> {
        let decision = decide(self.config.delivery_mode, self.config.nack_policy, outcome);

        match outcome {
            ConsumerOutcome::Accepted => {
                debug!(delivery_tag = tag, elapsed = ?elapsed, "item accepted");
            }
            ConsumerOutcome::Rejected { reason } => {
                warn!(delivery_tag = tag, %reason, ?decision, "item rejected");
            }
            ConsumerOutcome::TimedOut => {
                warn!(
                    delivery_tag = tag,
                    timeout = ?self.config.reply_timeout,
                    ?decision,
                    "no reply within the response budget"
                );
            }
        }

        if self.config.delivery_mode == DeliveryMode::AtMostOnce
            && self.config.nack_policy == NackPolicy::WarnAndAccept
            && !outcome.is_accepted()
        {
            warn!(
                delivery_tag = tag,
                "received a reject under auto-acknowledge: reject ignored and treated as acknowledged"
            );
        }

        match decision {
            AckDecision::Acknowledge => handle.acknowledge().await?,
            AckDecision::Reject => handle.reject().await?,
        }
        Ok(())
    }

    async fn on_finished(&mut self) {
        info!("stream finished");
        if self.config.forward_end_of_stream {
            if let Err(err) = self.consumer.end_of_stream().await {
                warn!(error = %err, "could not forward end-of-stream to the consumer");
            }
        }
        self.grant_credit().await;
    }

    async fn grant_credit(&mut self) {
        if self.credits.send(Credit).await.is_err() {
            debug!("credit receiver dropped; producer is gone");
        }
    }
}
