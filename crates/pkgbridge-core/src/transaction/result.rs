use serde::{Deserialize, Serialize};

use crate::error::{Error, UserFriendlyError};
use crate::session::FailureKind;

/// Final outcome of one operation.
///
/// Every failure mode (spawn error, rejected secret, non-zero exit, drain
/// timeout) ends up here; the facade never returns an error instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// True when the worker exited 0 and nothing else went wrong
    pub success: bool,
    /// Accumulated stdout text
    pub output: String,
    /// Accumulated non-protocol stderr text, or the spawn error
    pub error: String,
    /// Worker exit code; -1 when it never ran
    pub exit_code: i32,
    /// Why the operation failed, if it did
    pub failure: Option<FailureKind>,
}

impl OperationResult {
    /// The worker could not be started
    #[must_use]
    pub fn spawn_failure(error: impl Into<String>) -> Self {
        Self::not_started(FailureKind::Spawn, error)
    }

    /// The operation failed before a worker was spawned
    #[must_use]
    pub fn not_started(failure: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
            exit_code: -1,
            failure: Some(failure),
        }
    }

    /// Whether the elevation secret was the problem
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.failure,
            Some(FailureKind::Authentication | FailureKind::SecretUnavailable)
        )
    }

    /// The failure as a crate [`Error`], for rendering
    #[must_use]
    pub fn to_error(&self) -> Option<Error> {
        let detail = || self.error_summary().unwrap_or("no error output").to_string();
        Some(match self.failure? {
            FailureKind::Spawn => Error::Spawn(detail()),
            FailureKind::SecretUnavailable => Error::SecretUnavailable,
            FailureKind::Authentication => Error::Authentication(detail()),
            FailureKind::Transaction => Error::Transaction {
                exit_code: self.exit_code,
                message: detail(),
            },
            FailureKind::Interrupted => Error::Interrupted,
            FailureKind::DrainTimeout => Error::DrainTimeout,
        })
    }

    /// Last non-empty line of the error text
    #[must_use]
    pub fn error_summary(&self) -> Option<&str> {
        self.error.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }
}

impl UserFriendlyError for OperationResult {
    fn user_message(&self) -> String {
        match self.to_error() {
            Some(error) => error.user_message(),
            None => "Operation completed successfully.".to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        self.to_error()?.suggestion()
    }
}
