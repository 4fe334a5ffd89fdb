use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use conveyor_bridge::{BridgeHandle, DeliveryMode, StreamEvent};
use conveyor_core::{AckDecision, LifecycleSignal, TextIdCodec, WorkItem};

use crate::delivery::QueueDelivery;
use crate::log::{AckLog, AckRecord};

struct Queued {
    payload: Bytes,
    attempt: u32,
}

/// Totals for one broker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerSummary {
    /// Deliveries sent, redeliveries included.
    pub deliveries: u64,
    /// Rejected payloads that were queued again.
    pub redeliveries: u64,
}

/// In-memory queue that delivers through a bridge under the credit
/// protocol: one `Init`, then exactly one `Item` per credit, then
/// `Finished` once the queue is drained.
///
/// Under at-least-once delivery a rejected payload goes to the back of the
/// queue with a fresh delivery tag and a bumped attempt count. Under
/// at-most-once the payload is dropped, mirroring a transport that already
/// acknowledged on read.
pub struct QueueBroker {
    queue: VecDeque<Queued>,
    mode: DeliveryMode,
    log: AckLog,
    next_tag: u64,
}

impl QueueBroker {
    /// Broker preloaded with the payloads for work items `0..count`.
    #[must_use]
    pub fn new(count: u64, mode: DeliveryMode, log: AckLog) -> Self {
        Self::with_items((0..count).map(WorkItem::new), mode, log)
    }

    /// Broker preloaded with an explicit item sequence. Duplicates are
    /// delivered as-is; tests use this to provoke ledger anomalies.
    pub fn with_items(
        items: impl IntoIterator<Item = WorkItem>,
        mode: DeliveryMode,
        log: AckLog,
    ) -> Self {
        let queue = items
            .into_iter()
            .map(|item| Queued {
                payload: TextIdCodec::encode(item),
                attempt: 1,
            })
            .collect();
        Self {
            queue,
            mode,
            log,
            next_tag: 0,
        }
    }

    pub fn spawn(self, bridge: BridgeHandle) -> JoinHandle<BrokerSummary> {
        tokio::spawn(self.run(bridge))
    }

    /// Drive the queue to completion against the bridge.
    ///
    /// Returns early (with the partial summary) if the bridge goes away,
    /// which is what happens after a fatal protocol error on the bridge
    /// side.
    pub async fn run(mut self, mut bridge: BridgeHandle) -> BrokerSummary {
        let (decision_tx, mut decisions) = mpsc::unbounded_channel();
        let mut summary = BrokerSummary::default();

        let init = StreamEvent::Lifecycle(LifecycleSignal::StreamInit);
        if bridge.events.send(init).await.is_err() {
            warn!("bridge went away before stream init");
            return summary;
        }

        let mut outstanding: Option<Queued> = None;
        loop {
            if bridge.credits.recv().await.is_none() {
                warn!("bridge dropped the credit channel mid-stream");
                return summary;
            }

            if let Some(prev) = outstanding.take() {
                // The decision is applied before the credit is returned, so
                // it is already in the channel by the time we get here.
                let Some((delivery_tag, decision)) = decisions.recv().await else {
                    return summary;
                };
                self.log.push(AckRecord {
                    delivery_tag,
                    attempt: prev.attempt,
                    decision,
                });
                if decision == AckDecision::Reject {
                    match self.mode {
                        DeliveryMode::AtLeastOnce => {
                            debug!(delivery_tag, attempt = prev.attempt, "requeueing rejected delivery");
                            summary.redeliveries += 1;
                            self.queue.push_back(Queued {
                                payload: prev.payload,
                                attempt: prev.attempt + 1,
                            });
                        }
                        DeliveryMode::AtMostOnce => {
                            warn!(delivery_tag, "reject under at-most-once; payload dropped");
                        }
                    }
                }
            }

            match self.queue.pop_front() {
                Some(next) => {
                    self.next_tag += 1;
                    let handle =
                        QueueDelivery::new(next.payload.clone(), self.next_tag, decision_tx.clone());
                    summary.deliveries += 1;
                    if bridge
                        .events
                        .send(StreamEvent::Item(Box::new(handle)))
                        .await
                        .is_err()
                    {
                        warn!("bridge went away with deliveries still queued");
                        return summary;
                    }
                    outstanding = Some(next);
                }
                None => {
                    info!(
                        deliveries = summary.deliveries,
                        redeliveries = summary.redeliveries,
                        "queue drained"
                    );
                    let finished = StreamEvent::Lifecycle(LifecycleSignal::StreamFinished);
                    let _ = bridge.events.send(finished).await;
                    // The final credit confirms end-of-stream handling ran.
                    let _ = bridge.credits.recv().await;
                    return summary;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use conveyor_core::AckHandle;

    use super::*;

    /// Play the bridge side of the protocol by hand: receive events, send
    /// credits, and decide every delivery with `decide`.
    async fn drive_bridge(
        broker: QueueBroker,
        decide: impl Fn(u64) -> AckDecision,
    ) -> BrokerSummary {
        let (event_tx, mut event_rx) = mpsc::channel(1);
        let (credit_tx, credit_rx) = mpsc::channel(1);
        let handle = BridgeHandle {
            events: event_tx,
            credits: credit_rx,
        };
        let broker_task = broker.spawn(handle);

        assert!(matches!(
            event_rx.recv().await,
            Some(StreamEvent::Lifecycle(LifecycleSignal::StreamInit))
        ));
        credit_tx.send(conveyor_bridge::Credit).await.unwrap();
        loop {
            match event_rx.recv().await {
                Some(StreamEvent::Item(delivery)) => {
                    let tag = delivery.delivery_tag();
                    match decide(tag) {
                        AckDecision::Acknowledge => delivery.acknowledge().await.unwrap(),
                        AckDecision::Reject => delivery.reject().await.unwrap(),
                    }
                    credit_tx.send(conveyor_bridge::Credit).await.unwrap();
                }
                Some(StreamEvent::Lifecycle(LifecycleSignal::StreamFinished)) => {
                    credit_tx.send(conveyor_bridge::Credit).await.unwrap();
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        broker_task.await.unwrap()
    }

    #[tokio::test]
    async fn empty_queue_finishes_immediately() {
        let log = AckLog::new();
        let summary = drive_bridge(
            QueueBroker::new(0, DeliveryMode::AtLeastOnce, log.clone()),
            |_| AckDecision::Acknowledge,
        )
        .await;
        assert_eq!(summary, BrokerSummary::default());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn acknowledged_deliveries_are_not_requeued() {
        let log = AckLog::new();
        let summary = drive_bridge(
            QueueBroker::new(3, DeliveryMode::AtLeastOnce, log.clone()),
            |_| AckDecision::Acknowledge,
        )
        .await;
        assert_eq!(summary.deliveries, 3);
        assert_eq!(summary.redeliveries, 0);
        assert_eq!(log.acknowledged(), 3);
    }

    #[tokio::test]
    async fn rejected_delivery_is_requeued_with_bumped_attempt() {
        let log = AckLog::new();
        // Reject the very first delivery only.
        let summary = drive_bridge(
            QueueBroker::new(2, DeliveryMode::AtLeastOnce, log.clone()),
            |tag| {
                if tag == 1 {
                    AckDecision::Reject
                } else {
                    AckDecision::Acknowledge
                }
            },
        )
        .await;

        assert_eq!(summary.deliveries, 3);
        assert_eq!(summary.redeliveries, 1);
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        // The redelivery carries a fresh tag and attempt 2.
        let redelivered = entries.last().unwrap();
        assert_eq!(redelivered.delivery_tag, 3);
        assert_eq!(redelivered.attempt, 2);
        assert_eq!(redelivered.decision, AckDecision::Acknowledge);
    }

    #[tokio::test]
    async fn at_most_once_never_redelivers() {
        let log = AckLog::new();
        let summary = drive_bridge(
            QueueBroker::new(2, DeliveryMode::AtMostOnce, log.clone()),
            |_| AckDecision::Reject,
        )
        .await;
        assert_eq!(summary.deliveries, 2);
        assert_eq!(summary.redeliveries, 0);
        assert_eq!(log.rejected(), 2);
    }
}
