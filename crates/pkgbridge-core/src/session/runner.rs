use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::classify::{classify, ExitFacts, FailureKind};
use super::config::{PromptDetector, SessionConfig};
use super::drain::{close_after_drain, InFlight};
use super::pump::{pump_stdout, QueuedQuestion, StderrOutcome, StderrPump};
use super::state::{Lifecycle, SessionState};
use super::stdin::StdinWriter;
use crate::event_bus::EventBus;
use crate::protocol::encode_answer;
use crate::question::{QuestionRegistry, ResolutionSource};
use crate::secret::SecretStore;
use crate::transaction::OperationResult;

/// One worker process dedicated to one operation.
///
/// A session is consumed by [`run`](Self::run) and never reused.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    detector: PromptDetector,
    secrets: Arc<SecretStore>,
    questions: QuestionRegistry,
    events: EventBus,
    lifecycle: Arc<Lifecycle>,
}

impl Session {
    /// Create an idle session sharing the given store, registry and bus
    #[must_use]
    pub fn new(
        config: SessionConfig,
        detector: PromptDetector,
        secrets: Arc<SecretStore>,
        questions: QuestionRegistry,
        events: EventBus,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            config,
            detector,
            secrets,
            questions,
            lifecycle: Arc::new(Lifecycle::new(id, events.clone())),
            events,
        }
    }

    /// Session identifier, as carried by every event it publishes
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lifecycle.get()
    }

    /// Run the worker at `cli_path` with `args` to completion.
    ///
    /// With `wants_elevation` the worker is started through the configured
    /// elevation program, which reads the secret from its stdin once the
    /// password prompt shows up on stderr. Never returns an error: every
    /// failure is reported in the [`OperationResult`].
    pub async fn run(self, cli_path: &str, args: &[String], wants_elevation: bool) -> OperationResult {
        self.lifecycle.set(SessionState::Starting);

        let mut command = self.command(cli_path, args, wants_elevation);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(session_id = %self.id, path = %cli_path, error = %e, "Failed to spawn worker");
                self.lifecycle.set(SessionState::Closed);
                return OperationResult::spawn_failure(e.to_string());
            }
        };

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            self.lifecycle.set(SessionState::Closed);
            return OperationResult::spawn_failure("worker standard streams were not captured");
        };

        info!(
            session_id = %self.id,
            pid = ?child.id(),
            path = %cli_path,
            elevated = wants_elevation,
            "Worker started"
        );
        self.lifecycle.set(if wants_elevation {
            SessionState::WaitingForSecretPrompt
        } else {
            SessionState::Running
        });

        let stdin = Arc::new(StdinWriter::new(stdin));
        let inflight = InFlight::new();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout_task = tokio::spawn(pump_stdout(stdout, self.id, self.events.clone()));
        let stderr_task = tokio::spawn(
            StderrPump {
                session_id: self.id,
                elevated: wants_elevation,
                detector: self.detector.clone(),
                secrets: self.secrets.clone(),
                stdin: stdin.clone(),
                inflight: inflight.clone(),
                lifecycle: self.lifecycle.clone(),
                events: self.events.clone(),
                questions: tx,
            }
            .run(stderr),
        );
        let answer_task = tokio::spawn(self.answer_loop(rx, stdin.clone(), cancel.clone()));

        let exit_code = match child.wait().await {
            Ok(status) => status.code().unwrap_or_else(|| {
                warn!(session_id = %self.id, status = %status, "Worker terminated by signal");
                -1
            }),
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Failed to wait for worker");
                -1
            }
        };
        info!(session_id = %self.id, exit_code, "Worker exited");
        self.lifecycle.set(SessionState::Exiting);

        // One budget for the whole post-exit phase.
        let deadline = Instant::now() + self.config.drain_timeout;
        let output = join_or_abort(stdout_task, remaining(deadline)).await.unwrap_or_default();
        let stderr = join_or_abort(stderr_task, remaining(deadline)).await.unwrap_or_default();

        // Whatever is still unanswered settles to its default now.
        cancel.cancel();
        self.lifecycle.set(SessionState::Draining);
        let drained = close_after_drain(&inflight, &stdin, remaining(deadline)).await;

        let abandoned = if drained {
            join_or_abort(answer_task, remaining(deadline)).await.unwrap_or_default()
        } else {
            answer_task.abort();
            0
        };

        self.finish(exit_code, output, stderr, abandoned, drained)
    }

    fn command(&self, cli_path: &str, args: &[String], elevated: bool) -> Command {
        let mut command = if elevated {
            let mut c = Command::new(&self.config.elevation.program);
            c.args(&self.config.elevation.args).arg(cli_path);
            c
        } else {
            Command::new(cli_path)
        };
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Ask queued questions strictly in order and write their answers.
    ///
    /// Returns how many were settled by cancellation rather than answered.
    fn answer_loop(
        &self,
        mut rx: mpsc::UnboundedReceiver<QueuedQuestion>,
        stdin: Arc<StdinWriter>,
        cancel: CancellationToken,
    ) -> impl std::future::Future<Output = usize> + Send + 'static {
        let session_id = self.id;
        let registry = self.questions.clone();
        let lifecycle = self.lifecycle.clone();
        let defaults = self.config.defaults;
        let timeout = self.config.question_timeout;

        async move {
            let mut abandoned = 0;
            while let Some(QueuedQuestion { spec, guard }) = rx.recv().await {
                let kind = spec.kind;
                let default = defaults.for_question(&spec);
                if !spec.is_answerable() {
                    // Nothing to choose from; unblock the worker without publishing.
                    warn!(session_id = %session_id, kind = %kind, "Selection frame carried no options");
                    if let Err(e) = stdin.write_line(&encode_answer(kind, default)).await {
                        debug!(session_id = %session_id, error = %e, "Answer not delivered; worker input gone");
                    }
                    drop(guard);
                    continue;
                }
                let handle = registry.open(session_id, spec, default, timeout);
                lifecycle.set(SessionState::QuestionOpen);

                let resolution = handle.answer_or_cancel(&cancel).await;
                if resolution.source == ResolutionSource::Cancelled {
                    abandoned += 1;
                }

                match stdin.write_line(&encode_answer(kind, resolution.value)).await {
                    Ok(()) => lifecycle.set(SessionState::Answered),
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Answer not delivered; worker input gone");
                    }
                }
                drop(guard);
            }
            abandoned
        }
    }

    fn finish(
        self,
        exit_code: i32,
        output: String,
        stderr: StderrOutcome,
        questions_abandoned: usize,
        drained: bool,
    ) -> OperationResult {
        let facts = ExitFacts {
            exit_code,
            secret_rejected: stderr.secret_rejected,
            secret_missing: stderr.secret_missing,
            questions_abandoned,
            drained,
        };
        let failure = classify(&facts, &stderr.error, &self.config.auth_failure_phrases);

        match failure {
            Some(FailureKind::Authentication) => {
                self.secrets.invalidate("elevation secret rejected");
            }
            Some(kind) => {
                warn!(session_id = %self.id, exit_code, failure = ?kind, "Operation failed");
            }
            None => debug!(session_id = %self.id, "Operation succeeded"),
        }

        self.lifecycle.set(SessionState::Closed);
        OperationResult {
            success: exit_code == 0 && failure.is_none(),
            output,
            error: stderr.error,
            exit_code,
            failure,
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

async fn join_or_abort<T>(task: JoinHandle<T>, timeout: Duration) -> Option<T> {
    let abort = task.abort_handle();
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(error = %e, "Session task failed");
            None
        }
        Err(_) => {
            abort.abort();
            warn!(timeout_secs = timeout.as_secs(), "Session task outlived the drain deadline");
            None
        }
    }
}
