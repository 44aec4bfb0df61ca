//! Secret Store - Elevation secret management
//!
//! Holds the time-limited secret the elevation tool asks for, validates it
//! out-of-band and coalesces concurrent "secret needed" requests into a single
//! notification on the [`EventBus`](crate::event_bus::EventBus).
//!
//! ## Security Features
//!
//! - **SecureString**: Uses `zeroize` for memory wiping on clear and drop
//! - **Debug Safety**: The value is redacted in Debug/Display output
//! - **Expiry**: Records older than the configured TTL are treated as absent

#![forbid(unsafe_code)]

mod probe;
mod secure_string;
mod store;

#[cfg(test)]
mod tests;

pub use probe::{ElevationProbe, SystemProbe};
#[cfg(test)]
pub use probe::MockElevationProbe;
pub use secure_string::SecureString;
pub use store::{SecretStore, SecretStoreConfig, DEFAULT_SECRET_TTL, NO_SECRET_REQUIRED};
