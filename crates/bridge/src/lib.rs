//! The mediator bridge: decouples a push-based, credit-gated delivery
//! stream from the request/reply consumer, translating consumer outcomes
//! into acknowledge/reject signals while keeping exactly one item in
//! flight.

pub mod config;
pub mod event;
pub mod mediator;
pub mod policy;

pub use config::{BridgeConfig, DeliveryMode, NackPolicy};
pub use event::{Credit, StreamEvent};
pub use mediator::{BridgeHandle, MediatorBridge};
pub use policy::decide;
