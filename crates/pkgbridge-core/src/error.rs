//! Error types for pkgbridge-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;

use crate::question::QuestionError;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The worker (or the elevation tool wrapping it) could not be started
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    /// I/O error on one of the worker's standard streams
    #[error("worker i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Standard input was already closed when a write was attempted
    #[error("worker standard input is closed")]
    StdinClosed,

    /// The elevation secret was rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No elevation secret was supplied
    #[error("elevation secret unavailable")]
    SecretUnavailable,

    /// The worker exited non-zero
    #[error("transaction failed with exit code {exit_code}: {message}")]
    Transaction {
        /// Worker exit code
        exit_code: i32,
        /// Last line of the worker's error text
        message: String,
    },

    /// The worker exited while a question was still waiting for its answer
    #[error("worker exited with a question still open")]
    Interrupted,

    /// In-flight stream handlers did not finish before the drain deadline
    #[error("drain timed out before worker input could be closed")]
    DrainTimeout,

    /// Invalid configuration
    #[error("invalid configuration: {field}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Question resolution error
    #[error("question error: {0}")]
    Question(#[from] QuestionError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides a human-readable message and a suggestion for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Spawn(msg) => format!("Could not start the package worker: {}", msg),
            Error::Io(e) => format!("Lost contact with the package worker: {}", e),
            Error::StdinClosed => "The package worker stopped accepting input.".to_string(),
            Error::Authentication(msg) => format!("Authentication failed: {}", msg),
            Error::SecretUnavailable => "No password was provided.".to_string(),
            Error::Transaction { exit_code, message } => {
                format!("Transaction failed (exit code {}): {}", exit_code, message)
            }
            Error::Interrupted => {
                "The package worker exited while a question was still open.".to_string()
            }
            Error::DrainTimeout => {
                "The package worker did not finish cleanly before the drain timeout.".to_string()
            }
            Error::InvalidConfig { field, message } => {
                format!("Configuration error in '{}': {}", field, message)
            }
            Error::Question(e) => format!("Could not record the answer: {}", e),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Spawn(_) => {
                Some("Check the 'worker.path' and 'elevation.program' settings.".to_string())
            }
            Error::Authentication(_) | Error::SecretUnavailable => {
                Some("Run the command again and re-enter your password.".to_string())
            }
            Error::DrainTimeout => {
                Some("Raise 'timeouts.drain_secs' if transactions legitimately run long.".to_string())
            }
            Error::InvalidConfig { field, .. } => Some(format!(
                "Check the '{}' setting in config/default.toml or the PKGBRIDGE_ environment.",
                field
            )),
            Error::Question(QuestionError::OptionOutOfRange { len, .. }) => Some(format!(
                "Pick a number between 0 and {}.",
                len.saturating_sub(1)
            )),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &dyn UserFriendlyError) -> String {
    let mut output = error.user_message();
    output.push('\n');

    if let Some(suggestion) = error.suggestion() {
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}
