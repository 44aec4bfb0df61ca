use serde::{Deserialize, Serialize};

/// Why an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The worker could not be started
    Spawn,
    /// No secret was available for an elevated operation
    SecretUnavailable,
    /// The elevation secret was rejected
    Authentication,
    /// The worker ran and exited non-zero
    Transaction,
    /// The worker exited while a question was still waiting
    Interrupted,
    /// In-flight handlers outlived the drain timeout
    DrainTimeout,
}

/// Facts gathered by a session once its worker has exited
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExitFacts {
    pub exit_code: i32,
    pub secret_rejected: bool,
    pub secret_missing: bool,
    pub questions_abandoned: usize,
    pub drained: bool,
}

/// Classify the outcome of a finished worker.
///
/// A rejected secret outranks a plain non-zero exit so the secret store gets
/// invalidated. A clean exit can still fail if a question was abandoned or
/// the drain timed out.
pub(crate) fn classify(
    facts: &ExitFacts,
    error_text: &str,
    auth_phrases: &[String],
) -> Option<FailureKind> {
    let lowered = error_text.to_lowercase();
    let phrase_hit = auth_phrases
        .iter()
        .any(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()));

    if facts.secret_missing && !facts.secret_rejected && facts.exit_code != 0 {
        Some(FailureKind::SecretUnavailable)
    } else if facts.secret_rejected || (facts.exit_code != 0 && phrase_hit) {
        Some(FailureKind::Authentication)
    } else if facts.exit_code != 0 {
        Some(FailureKind::Transaction)
    } else if !facts.drained {
        Some(FailureKind::DrainTimeout)
    } else if facts.questions_abandoned > 0 {
        Some(FailureKind::Interrupted)
    } else {
        None
    }
}
