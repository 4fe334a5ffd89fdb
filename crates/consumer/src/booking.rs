use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{info, warn};

use conveyor_core::{ConsumerOutcome, PayloadCodec, ProcessingLedger};

use crate::fault::FaultPolicy;
use crate::port::ConsumerPort;

/// The consumer that performs the actual unit of work: "booking" an id.
///
/// Decodes the raw payload, consults the fault policy, and on success
/// increments the processing ledger before returning `Accepted`. The
/// increment happens before the reply is sent; if the reply is then lost
/// (crash, timeout) the item is redelivered and double-counted -- an
/// accepted trade-off under at-least-once delivery that the completion
/// monitor reports as a duplicate anomaly rather than hiding.
pub struct BookingConsumer {
    codec: Box<dyn PayloadCodec>,
    ledger: Arc<ProcessingLedger>,
    faults: Box<dyn FaultPolicy>,
    attempts: AtomicU64,
}

impl BookingConsumer {
    /// Create a booking consumer over the given codec, ledger, and fault
    /// policy.
    pub fn new(
        codec: impl PayloadCodec + 'static,
        ledger: Arc<ProcessingLedger>,
        faults: impl FaultPolicy + 'static,
    ) -> Self {
        Self {
            codec: Box::new(codec),
            ledger: Arc::clone(&ledger),
            faults: Box::new(faults),
            attempts: AtomicU64::new(0),
        }
    }

    /// Number of processing attempts made so far, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl ConsumerPort for BookingConsumer {
    fn name(&self) -> &str {
        "booking"
    }

    async fn process(&self, payload: Bytes) -> ConsumerOutcome {
        let item = match self.codec.decode(&payload) {
            Ok(item) => item,
            Err(err) => {
                warn!(error = %err, payload_len = payload.len(), "booking failed: undecodable payload");
                return ConsumerOutcome::rejected(format!("decode failed: {err}"));
            }
        };

        let sequence = self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = self.faults.inject(item, sequence) {
            warn!(item = %item, sequence, "booking failed: injected fault");
            return ConsumerOutcome::rejected(reason);
        }

        if !self.ledger.record(item.id()) {
            warn!(item = %item, key_space = self.ledger.key_space(), "booking failed: id outside key space");
            return ConsumerOutcome::rejected(format!("{item} outside the known key space"));
        }

        info!(item = %item, "booking successful");
        ConsumerOutcome::Accepted
    }

    async fn on_stream_end(&self) {
        info!(
            attempts = self.attempts(),
            booked = self.ledger.total(),
            "delivery stream ended"
        );
    }
}
