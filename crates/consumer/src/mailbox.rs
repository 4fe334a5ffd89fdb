use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use conveyor_core::{ConsumerOutcome, PipelineError};

use crate::port::DynConsumerPort;

const DEFAULT_CAPACITY: usize = 8;

enum MailboxMessage {
    Process {
        payload: Bytes,
        reply: oneshot::Sender<ConsumerOutcome>,
    },
    EndOfStream,
}

/// Single-task request/reply loop in front of a [`DynConsumerPort`].
///
/// The mailbox serializes all processing on one task and isolates panics:
/// a crash inside `process` is caught, counted, and answered with a
/// `Rejected` outcome so the bridge can still return credit. This is the
/// recovery path that keeps the pipeline from deadlocking on a consumer
/// crash mid-request.
pub struct ConsumerMailbox;

impl ConsumerMailbox {
    /// Spawn the mailbox task for the given consumer.
    pub fn spawn(port: Arc<dyn DynConsumerPort>) -> (ConsumerHandle, JoinHandle<()>) {
        Self::spawn_with_capacity(port, DEFAULT_CAPACITY)
    }

    /// Spawn with an explicit request channel capacity.
    pub fn spawn_with_capacity(
        port: Arc<dyn DynConsumerPort>,
        capacity: usize,
    ) -> (ConsumerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let crashes = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(run(port, rx, Arc::clone(&crashes)));
        (ConsumerHandle { tx, crashes }, task)
    }
}

/// Cheaply cloneable handle for sending requests into the mailbox.
#[derive(Clone)]
pub struct ConsumerHandle {
    tx: mpsc::Sender<MailboxMessage>,
    crashes: Arc<AtomicUsize>,
}

impl ConsumerHandle {
    /// Submit one payload for processing and return the reply channel.
    ///
    /// The caller owns the wait (and its deadline); dropping the returned
    /// receiver abandons the reply without disturbing the mailbox.
    pub async fn request(
        &self,
        payload: Bytes,
    ) -> Result<oneshot::Receiver<ConsumerOutcome>, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MailboxMessage::Process { payload, reply })
            .await
            .map_err(|_| PipelineError::ConsumerUnavailable)?;
        Ok(rx)
    }

    /// Notify the consumer that the delivery stream has finished.
    pub async fn end_of_stream(&self) -> Result<(), PipelineError> {
        self.tx
            .send(MailboxMessage::EndOfStream)
            .await
            .map_err(|_| PipelineError::ConsumerUnavailable)
    }

    /// Number of consumer crashes the mailbox has recovered from.
    pub fn crash_count(&self) -> usize {
        self.crashes.load(Ordering::Relaxed)
    }
}

async fn run(
    port: Arc<dyn DynConsumerPort>,
    mut rx: mpsc::Receiver<MailboxMessage>,
    crashes: Arc<AtomicUsize>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            MailboxMessage::Process { payload, reply } => {
                let outcome = match AssertUnwindSafe(port.process(payload)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let reason = panic_reason(panic.as_ref());
                        crashes.fetch_add(1, Ordering::Relaxed);
                        error!(
                            consumer = port.name(),
                            reason,
                            "consumer crashed mid-request; rejecting so credit is returned"
                        );
                        ConsumerOutcome::rejected(format!("consumer crashed: {reason}"))
                    }
                };
                // The receiver may already be gone if the bridge timed the
                // request out; that is not an error here.
                let _ = reply.send(outcome);
            }
            MailboxMessage::EndOfStream => port.on_stream_end().await,
        }
    }
    debug!(consumer = port.name(), "consumer mailbox closed");
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
