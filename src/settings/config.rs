//! Configuration types
//!
//! Deserialized from the layered sources and converted into the core
//! crate's configuration structs.

use std::time::Duration;

use anyhow::{bail, Result};
use pkgbridge_core::{
    BridgeConfig, DefaultAnswers, ElevationConfig, SecretStoreConfig, SessionConfig, SystemProbe,
};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub worker: WorkerSettings,
    pub elevation: ElevationSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub defaults: DefaultAnswers,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Worker executable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Elevation program and prompt handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationSettings {
    #[serde(default = "default_elevation_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_prompt_pattern")]
    pub prompt_pattern: String,
    #[serde(default = "default_auth_failure_phrases")]
    pub auth_failure_phrases: Vec<String>,
}

fn default_elevation_program() -> String {
    "sudo".to_string()
}

fn default_prompt_pattern() -> String {
    pkgbridge_core::session::DEFAULT_PROMPT_PATTERN.to_string()
}

fn default_auth_failure_phrases() -> Vec<String> {
    pkgbridge_core::session::DEFAULT_AUTH_FAILURE_PHRASES
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Timeouts, in seconds; 0 disables the optional ones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default)]
    pub question_secs: u64,
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
    #[serde(default = "default_secret_ttl_secs")]
    pub secret_ttl_secs: u64,
    #[serde(default = "default_validation_secs")]
    pub validation_secs: u64,
    #[serde(default)]
    pub secret_request_secs: u64,
}

fn default_drain_secs() -> u64 {
    120
}

fn default_secret_ttl_secs() -> u64 {
    540
}

fn default_validation_secs() -> u64 {
    30
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            question_secs: 0,
            drain_secs: default_drain_secs(),
            secret_ttl_secs: default_secret_ttl_secs(),
            validation_secs: default_validation_secs(),
            secret_request_secs: 0,
        }
    }
}

/// Log file output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub directory: Option<String>,
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl AppConfig {
    /// Reject values no session could run with
    pub fn validate(&self) -> Result<()> {
        if self.worker.path.trim().is_empty() {
            bail!("worker.path must not be empty");
        }
        if self.elevation.program.trim().is_empty() {
            bail!("elevation.program must not be empty");
        }
        if self.timeouts.drain_secs == 0 {
            bail!("timeouts.drain_secs must be at least 1");
        }
        if self.timeouts.secret_ttl_secs == 0 {
            bail!("timeouts.secret_ttl_secs must be at least 1");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            elevation: ElevationConfig {
                program: self.elevation.program.clone(),
                args: self.elevation.args.clone(),
            },
            prompt_pattern: self.elevation.prompt_pattern.clone(),
            auth_failure_phrases: self.elevation.auth_failure_phrases.clone(),
            question_timeout: optional_secs(self.timeouts.question_secs),
            drain_timeout: Duration::from_secs(self.timeouts.drain_secs),
            defaults: self.defaults,
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            worker_path: self.worker.path.clone(),
            worker_args: self.worker.args.clone(),
            session: self.session_config(),
        }
    }

    pub fn secret_store_config(&self) -> SecretStoreConfig {
        SecretStoreConfig {
            ttl: Duration::from_secs(self.timeouts.secret_ttl_secs),
            request_timeout: optional_secs(self.timeouts.secret_request_secs),
        }
    }

    /// Validation probe using the configured elevation program
    pub fn probe(&self) -> SystemProbe {
        SystemProbe::new(self.elevation.program.clone())
            .with_timeout(Duration::from_secs(self.timeouts.validation_secs.max(1)))
    }
}
