//! Core types and shared abstractions for the Conveyor delivery pipeline.

pub mod ack;
pub mod codec;
pub mod error;
pub mod item;
pub mod ledger;
pub mod lifecycle;
pub mod outcome;

pub use ack::{AckDecision, AckError, AckHandle};
pub use codec::{DecodeError, PayloadCodec, TextIdCodec};
pub use error::PipelineError;
pub use item::WorkItem;
pub use ledger::{Anomaly, ProcessingLedger, VerificationReport};
pub use lifecycle::LifecycleSignal;
pub use outcome::ConsumerOutcome;
