//! In-memory stand-in for the delivery subsystem.
//!
//! [`QueueBroker`] plays the queue's role against a real bridge: it honors
//! the credit protocol, delivers one payload per credit, and requeues
//! rejected payloads under at-least-once delivery. Every acknowledgment
//! decision is captured in an [`AckLog`] so tests can assert on the exact
//! ack/reject history.

pub mod broker;
pub mod delivery;
pub mod log;

pub use broker::{BrokerSummary, QueueBroker};
pub use delivery::QueueDelivery;
pub use log::{AckLog, AckRecord};
