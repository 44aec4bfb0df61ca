use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of interactive prompt raised by the transaction engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Yes/no confirmation; answer 1 = yes, 0 = no
    YesNo,
    /// Pick one provider for a virtual dependency; answer = option index
    SelectProvider,
    /// Pick how to resolve a package conflict; answer = option index
    Conflict,
}

impl QuestionKind {
    /// Whether the answer is an index into the options
    #[must_use]
    pub fn is_selection(self) -> bool {
        matches!(self, Self::SelectProvider | Self::Conflict)
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::YesNo => write!(f, "yes/no"),
            Self::SelectProvider => write!(f, "provider"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

/// The content of a question as decoded from one complete frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Question kind
    pub kind: QuestionKind,
    /// Prompt to display
    pub text: String,
    /// Ordered options; positions are significant (answer = index)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Optional context, e.g. the dependency being resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl QuestionSpec {
    /// A yes/no confirmation
    #[must_use]
    pub fn yes_no(text: impl Into<String>) -> Self {
        Self {
            kind: QuestionKind::YesNo,
            text: text.into(),
            options: Vec::new(),
            subject: None,
        }
    }

    /// A provider selection for `subject`
    #[must_use]
    pub fn provider(subject: impl Into<String>, options: Vec<String>) -> Self {
        let subject = subject.into();
        let text = if subject.is_empty() {
            "Select a provider".to_string()
        } else {
            format!("Select a provider for {}", subject)
        };
        Self {
            kind: QuestionKind::SelectProvider,
            text,
            options,
            subject: Some(subject).filter(|s| !s.is_empty()),
        }
    }

    /// A conflict resolution choice
    #[must_use]
    pub fn conflict(text: impl Into<String>, options: Vec<String>) -> Self {
        let text = text.into();
        Self {
            kind: QuestionKind::Conflict,
            text: if text.is_empty() {
                "Resolve package conflict".to_string()
            } else {
                text
            },
            options,
            subject: None,
        }
    }

    /// Whether any answer can pass [`check_answer`](Self::check_answer).
    ///
    /// False only for a selection frame that carried no options.
    #[must_use]
    pub fn is_answerable(&self) -> bool {
        !self.kind.is_selection() || !self.options.is_empty()
    }

    /// Check that `value` is a legal answer for this question
    pub fn check_answer(&self, value: usize) -> Result<(), QuestionError> {
        if self.kind.is_selection() {
            if value >= self.options.len() {
                return Err(QuestionError::OptionOutOfRange {
                    value,
                    len: self.options.len(),
                });
            }
        } else if value > 1 {
            return Err(QuestionError::InvalidYesNo(value));
        }
        Ok(())
    }
}

/// One pending interactive prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique question ID, used when answering
    pub id: Uuid,
    /// Session that raised the question
    pub session_id: Uuid,
    /// Decoded content
    #[serde(flatten)]
    pub spec: QuestionSpec,
    /// Answer; unset until resolved
    pub answer: Option<usize>,
    /// When the question was opened
    pub created_at: DateTime<Utc>,
    /// When the default answer will be applied, if a deadline is set
    pub expires_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Create a new open question
    #[must_use]
    pub fn new(session_id: Uuid, spec: QuestionSpec, deadline: Option<std::time::Duration>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            spec,
            answer: None,
            created_at: now,
            expires_at: deadline
                .and_then(|d| Duration::from_std(d).ok())
                .map(|d| now + d),
        }
    }

    /// Question kind
    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.spec.kind
    }

    /// Question options
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.spec.options
    }
}

/// Who settled a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// A human (or front-end) answered
    User,
    /// The deadline passed and the default was applied
    Timeout,
    /// The session ended first and the default was applied
    Cancelled,
}

/// The final answer to a question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Answer value
    pub value: usize,
    /// Who supplied it
    pub source: ResolutionSource,
}

/// Answer applied when nobody answers in time.
///
/// `yes_no` is 0 (decline) by default and `selection` is 0 (first option).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultAnswers {
    /// Default for yes/no questions (1 = yes, 0 = no)
    pub yes_no: usize,
    /// Default option index for selection questions
    pub selection: usize,
}

impl DefaultAnswers {
    /// The default for `spec`, clamped to a legal answer
    #[must_use]
    pub fn for_question(&self, spec: &QuestionSpec) -> usize {
        if spec.kind.is_selection() {
            if self.selection < spec.options.len() {
                self.selection
            } else {
                0
            }
        } else {
            self.yes_no.min(1)
        }
    }
}

/// Outcome of a resolve call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// This call set the answer
    Resolved,
    /// The question was already settled (or never existed); nothing changed
    AlreadyResolved,
}

/// Error from question resolution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    /// Selection index outside `[0, len)`
    #[error("option {value} out of range (question has {len} options)")]
    OptionOutOfRange {
        /// Rejected value
        value: usize,
        /// Number of options
        len: usize,
    },
    /// Yes/no answers must be 0 or 1
    #[error("yes/no answer must be 0 or 1, got {0}")]
    InvalidYesNo(usize),
}
