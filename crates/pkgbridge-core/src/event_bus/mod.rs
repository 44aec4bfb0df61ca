//! EventBus - broadcast-based event system for bridge events.
//!
//! Presentation layers (CLI table renderer, GUI dialogs, machine-readable line
//! emitter) subscribe here for decoded questions, progress lines and session
//! lifecycle updates, so they can be swapped without touching the bridge.

/// Core event bus implementation (broadcast channel).
pub mod bus;
/// Event type definitions for the bridge lifecycle.
pub mod types;

pub use bus::{next_delivery, Delivery, EventBus};
pub use types::{BridgeEvent, StreamKind};
