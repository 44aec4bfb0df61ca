//! Question - Pending-question registry
//!
//! When the transaction engine asks something mid-transaction, the decoded
//! frame becomes a [`Question`]. The registry publishes it once on the event
//! bus and hands the session a [`QuestionHandle`] that suspends until a front
//! end answers, the deadline passes, or the session is cancelled.

/// Open questions and their awaitable handles.
pub mod registry;
/// Question content, answers and defaults.
pub mod types;

pub use registry::{QuestionHandle, QuestionRegistry};
pub use types::{
    DefaultAnswers, Question, QuestionError, QuestionKind, QuestionSpec, Resolution,
    ResolutionSource, ResolveOutcome,
};

#[cfg(test)]
mod tests;
