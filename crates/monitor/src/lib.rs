//! Completion detection for the pipeline.
//!
//! The monitor samples the processing ledger on a fixed tick. When the
//! total stops moving for long enough the stream is presumed drained; the
//! ledger is then verified and the pipeline's cancellation token fired.

pub mod config;
pub mod monitor;

pub use config::MonitorConfig;
pub use monitor::{CompletionMonitor, MonitorPhase};
