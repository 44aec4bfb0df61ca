//! Transaction - Front-end facade
//!
//! [`TransactionBridge`] exposes one async method per package operation and
//! a subscribe-only stream of [`BridgeEvent`](crate::event_bus::BridgeEvent)s
//! so presenters can be swapped without touching the bridge.

mod facade;
mod operation;
mod result;


pub use facade::{BridgeConfig, TransactionBridge};
pub use operation::Operation;
pub use result::OperationResult;
