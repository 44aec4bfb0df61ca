use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::question::DefaultAnswers;

/// Default bound on the drain-before-close wait (2 minutes)
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Default password prompt recognised on the control stream.
///
/// Matches the prompt configured through [`ElevationConfig::default`] as well
/// as the stock `sudo` and `su` prompts.
pub const DEFAULT_PROMPT_PATTERN: &str = r"^(\[sudo\] password for [^:]*|Password):\s*$";

/// Phrases in the error text that mean the secret was rejected
pub const DEFAULT_AUTH_FAILURE_PHRASES: &[&str] = &[
    "incorrect password",
    "Sorry, try again",
    "authentication failure",
    "a password is required",
    "no password was provided",
];

/// How an elevated worker is spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationConfig {
    /// Elevation program, e.g. `sudo`
    pub program: String,
    /// Arguments placed before the worker path. They must make the program
    /// read the secret from its own stdin instead of a TTY.
    pub args: Vec<String>,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            program: "sudo".to_string(),
            args: vec![
                "-S".to_string(),
                "-p".to_string(),
                "[sudo] password for %p: ".to_string(),
            ],
        }
    }
}

/// Per-session behaviour
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Elevation mechanism
    pub elevation: ElevationConfig,
    /// Regex recognising the elevation tool's password prompt
    pub prompt_pattern: String,
    /// Substrings of the error text classifying a failure as authentication
    pub auth_failure_phrases: Vec<String>,
    /// Deadline for each question; `None` waits for the user indefinitely
    pub question_timeout: Option<Duration>,
    /// Bound on the drain-before-close wait
    pub drain_timeout: Duration,
    /// Answers applied on timeout or cancellation
    pub defaults: DefaultAnswers,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            elevation: ElevationConfig::default(),
            prompt_pattern: DEFAULT_PROMPT_PATTERN.to_string(),
            auth_failure_phrases: DEFAULT_AUTH_FAILURE_PHRASES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            question_timeout: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            defaults: DefaultAnswers::default(),
        }
    }
}

/// Compiled password-prompt recogniser
#[derive(Debug, Clone)]
pub struct PromptDetector {
    regex: Regex,
}

impl PromptDetector {
    /// Compile `pattern`
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::InvalidConfig {
            field: "elevation.prompt_pattern".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    /// Whether `text` (a full line or an unterminated tail) is the prompt
    #[must_use]
    pub fn is_prompt(&self, text: &str) -> bool {
        self.regex.is_match(text.trim_end_matches(['\r', '\n']))
    }
}
