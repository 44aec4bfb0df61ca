use serde::Serialize;
use uuid::Uuid;

use crate::question::{Question, ResolutionSource};
use crate::session::SessionState;

/// Which of the worker's output streams a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Free-form progress text
    Stdout,
    /// Opaque (non-protocol) text from the control stream
    Stderr,
}

/// Events emitted by the bridge.
///
/// **Security note**: these events never carry the elevation secret. The
/// password prompt line itself is suppressed before anything is published.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A session moved to a new lifecycle state
    SessionState {
        /// Session identifier
        session_id: Uuid,
        /// New state
        state: SessionState,
    },
    /// A raw progress/log line from the worker
    LogLine {
        /// Session identifier
        session_id: Uuid,
        /// Source stream
        stream: StreamKind,
        /// Line text without the trailing newline
        line: String,
    },
    /// A decoded question is waiting for an answer
    QuestionAsked {
        /// Session identifier
        session_id: Uuid,
        /// The question (answer not yet set)
        question: Question,
    },
    /// A question received its one and only answer
    QuestionResolved {
        /// Session identifier
        session_id: Uuid,
        /// Question identifier
        question_id: Uuid,
        /// Answer value (1/0 for yes/no, option index otherwise)
        answer: usize,
        /// Who supplied the answer
        source: ResolutionSource,
    },
    /// The secret store needs the elevation secret from the user
    SecretRequired {
        /// Why elevation is needed
        reason: String,
    },
    /// A pending secret request completed
    SecretResolved {
        /// Whether a secret was supplied and validated
        accepted: bool,
    },
    /// An operation produced its result
    OperationFinished {
        /// Session identifier
        session_id: Uuid,
        /// Operation name (e.g. "install")
        operation: String,
        /// Whether the operation succeeded
        success: bool,
        /// Worker exit code (-1 when it never ran)
        exit_code: i32,
    },
}

impl BridgeEvent {
    /// Get the session this event belongs to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Self::SessionState { session_id, .. }
            | Self::LogLine { session_id, .. }
            | Self::QuestionAsked { session_id, .. }
            | Self::QuestionResolved { session_id, .. }
            | Self::OperationFinished { session_id, .. } => Some(*session_id),
            Self::SecretRequired { .. } | Self::SecretResolved { .. } => None,
        }
    }
}
