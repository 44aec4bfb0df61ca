//! Settings for the pkgbridge binary
//!
//! Layered configuration: embedded defaults, optional files, then
//! `PKGBRIDGE_*` environment variables.

mod config;
mod loader;

pub use self::config::{AppConfig, LoggingSettings};
pub use loader::load_config;
