//! Consumer-side building blocks for the Conveyor pipeline: the
//! [`ConsumerPort`] seam the bridge drives, the booking consumer that does
//! the actual work, pluggable fault injection, and the mailbox task that
//! isolates consumer crashes from the bridge.

pub mod booking;
pub mod fault;
pub mod mailbox;
pub mod port;

pub use booking::BookingConsumer;
pub use fault::{FaultPolicy, NoFaults, RandomFaults, ScriptedFaults};
pub use mailbox::{ConsumerHandle, ConsumerMailbox};
pub use port::{ConsumerPort, DynConsumerPort};
