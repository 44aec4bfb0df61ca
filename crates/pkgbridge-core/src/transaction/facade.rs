use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use super::operation::Operation;
use super::result::OperationResult;
use crate::error::Result;
use crate::event_bus::{BridgeEvent, EventBus};
use crate::question::{Question, QuestionError, QuestionRegistry, ResolveOutcome};
use crate::secret::SecretStore;
use crate::session::{FailureKind, PromptDetector, Session, SessionConfig};

/// What the facade runs and how
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Worker executable
    pub worker_path: String,
    /// Arguments placed before every operation's own arguments
    pub worker_args: Vec<String>,
    /// Per-session behaviour
    pub session: SessionConfig,
}

impl BridgeConfig {
    /// Config for the worker at `worker_path` with default session settings
    #[must_use]
    pub fn new(worker_path: impl Into<String>) -> Self {
        Self {
            worker_path: worker_path.into(),
            worker_args: Vec::new(),
            session: SessionConfig::default(),
        }
    }
}

/// Typed entry point for package operations.
///
/// Each operation makes sure a secret is available when it needs elevation,
/// then runs one [`Session`] and returns its [`OperationResult`]. Operations
/// run one at a time. Questions and progress lines reach front ends through
/// [`subscribe`](Self::subscribe); answers come back through
/// [`answer`](Self::answer).
pub struct TransactionBridge {
    config: BridgeConfig,
    detector: PromptDetector,
    secrets: Arc<SecretStore>,
    questions: QuestionRegistry,
    events: EventBus,
    gate: Mutex<()>,
}

impl TransactionBridge {
    /// Create a bridge. Fails only if the prompt pattern does not compile.
    pub fn new(config: BridgeConfig, secrets: Arc<SecretStore>, events: EventBus) -> Result<Self> {
        let detector = PromptDetector::new(&config.session.prompt_pattern)?;
        Ok(Self {
            config,
            detector,
            secrets,
            questions: QuestionRegistry::new(events.clone()),
            events,
            gate: Mutex::new(()),
        })
    }

    /// Refresh the package databases
    pub async fn sync_databases(&self) -> OperationResult {
        self.run(Operation::SyncDatabases).await
    }

    /// Install packages by name
    pub async fn install_packages(&self, names: &[String]) -> OperationResult {
        self.run(Operation::InstallPackages(names.to_vec())).await
    }

    /// Remove packages by name
    pub async fn remove_packages(&self, names: &[String]) -> OperationResult {
        self.run(Operation::RemovePackages(names.to_vec())).await
    }

    /// Update the named packages
    pub async fn update_packages(&self, names: &[String]) -> OperationResult {
        self.run(Operation::UpdatePackages(names.to_vec())).await
    }

    /// Update every installed package
    pub async fn upgrade_system(&self) -> OperationResult {
        self.run(Operation::UpgradeSystem).await
    }

    /// Install a package file from disk
    pub async fn install_local_package(&self, path: &Path) -> OperationResult {
        self.run(Operation::InstallLocalPackage(path.to_path_buf())).await
    }

    /// Remove orphaned dependencies
    pub async fn remove_orphans(&self) -> OperationResult {
        self.run(Operation::RemoveOrphans).await
    }

    /// List available updates (runs without elevation)
    pub async fn check_updates(&self) -> OperationResult {
        self.run(Operation::CheckUpdates).await
    }

    /// Run any operation
    pub async fn run(&self, operation: Operation) -> OperationResult {
        let _turn = self.gate.lock().await;

        let session = Session::new(
            self.config.session.clone(),
            self.detector.clone(),
            self.secrets.clone(),
            self.questions.clone(),
            self.events.clone(),
        );
        let session_id = session.id();
        let elevated = operation.wants_elevation();
        info!(session_id = %session_id, operation = %operation, elevated, "Starting operation");

        if elevated {
            let reason = format!("'{}' needs administrator rights", operation.name());
            if !self.secrets.request_secret(&reason).await {
                warn!(session_id = %session_id, "No usable elevation secret; operation not started");
                let result = OperationResult::not_started(
                    FailureKind::SecretUnavailable,
                    "elevation secret unavailable",
                );
                self.finished(session_id, &operation, &result);
                return result;
            }
        }

        let mut args = self.config.worker_args.clone();
        args.extend(operation.worker_args());
        let result = session.run(&self.config.worker_path, &args, elevated).await;

        self.finished(session_id, &operation, &result);
        result
    }

    /// Subscribe to questions, progress lines and lifecycle events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Answer an open question; duplicate answers are harmless no-ops
    pub fn answer(
        &self,
        question_id: Uuid,
        value: usize,
    ) -> std::result::Result<ResolveOutcome, QuestionError> {
        self.questions.resolve(question_id, value)
    }

    /// Questions currently waiting for an answer, oldest first
    #[must_use]
    pub fn pending_questions(&self) -> Vec<Question> {
        self.questions.pending()
    }

    /// Hand over the secret for a pending request. Returns whether it was
    /// accepted by validation.
    pub async fn supply_secret(&self, secret: impl Into<String>) -> bool {
        self.secrets.store(secret);
        self.secrets.complete_request(true).await
    }

    /// Refuse a pending secret request
    pub async fn decline_secret(&self) {
        self.secrets.complete_request(false).await;
    }

    /// The shared secret store
    #[must_use]
    pub fn secrets(&self) -> &Arc<SecretStore> {
        &self.secrets
    }

    /// The question registry backing [`answer`](Self::answer)
    #[must_use]
    pub fn questions(&self) -> &QuestionRegistry {
        &self.questions
    }

    fn finished(&self, session_id: Uuid, operation: &Operation, result: &OperationResult) {
        info!(
            session_id = %session_id,
            operation = operation.name(),
            success = result.success,
            exit_code = result.exit_code,
            "Operation finished"
        );
        self.events.publish(BridgeEvent::OperationFinished {
            session_id,
            operation: operation.name().to_string(),
            success: result.success,
            exit_code: result.exit_code,
        });
    }
}
