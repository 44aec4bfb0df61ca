//! Pkgbridge Core - Privileged transaction bridge
//!
//! This crate connects an unprivileged front end to an elevated package
//! worker process, including:
//! - Secret: time-limited elevation secret with out-of-band validation
//! - Protocol: the line-based control protocol spoken on the worker's stderr
//! - Question: registry of open questions with cooperative waiting
//! - Session: one worker process, its pumps and the drain-before-close rule
//! - Transaction: the typed operation facade front ends call
//! - Event Bus: broadcast stream of questions, progress and lifecycle events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event_bus;
pub mod protocol;
pub mod question;
pub mod secret;
pub mod session;
pub mod transaction;

pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use event_bus::{next_delivery, BridgeEvent, Delivery, EventBus, StreamKind};
pub use protocol::{decode_answer, encode_answer, FrameDecoder, WorkerPrompter};
pub use question::{
    DefaultAnswers, Question, QuestionError, QuestionHandle, QuestionKind, QuestionRegistry,
    QuestionSpec, ResolutionSource, ResolveOutcome,
};
pub use secret::{
    ElevationProbe, SecretStore, SecretStoreConfig, SecureString, SystemProbe, DEFAULT_SECRET_TTL,
};
pub use session::{
    ElevationConfig, FailureKind, PromptDetector, Session, SessionConfig, SessionState,
};
pub use transaction::{BridgeConfig, Operation, OperationResult, TransactionBridge};
