//! End-to-end sessions against shell scripts standing in for the worker
//! and the elevation program.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pkgbridge_core::{
    BridgeEvent, ElevationConfig, ElevationProbe, EventBus, FailureKind, OperationResult,
    PromptDetector, Question, QuestionKind, QuestionRegistry, ResolutionSource, SecretStore,
    SecretStoreConfig, SecureString, Session, SessionConfig,
};
use tokio::sync::broadcast;

struct AcceptAll;

#[async_trait::async_trait]
impl ElevationProbe for AcceptAll {
    async fn requires_secret(&self) -> bool {
        true
    }

    async fn validate(&self, _secret: &SecureString) -> bool {
        true
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    root: PathBuf,
    events: EventBus,
    registry: QuestionRegistry,
    secrets: Arc<SecretStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let events = EventBus::new(256);
        Self {
            _dir: dir,
            root,
            registry: QuestionRegistry::new(events.clone()),
            secrets: Arc::new(
                SecretStore::new(Arc::new(AcceptAll), SecretStoreConfig::default())
                    .with_event_bus(events.clone()),
            ),
            events,
        }
    }

    fn script(&self, name: &str, body: &str) -> String {
        write_script(&self.root, name, body)
    }

    fn session(&self, config: SessionConfig) -> Session {
        let detector = PromptDetector::new(&config.prompt_pattern).unwrap();
        Session::new(
            config,
            detector,
            self.secrets.clone(),
            self.registry.clone(),
            self.events.clone(),
        )
    }

    fn spawn_run(
        &self,
        config: SessionConfig,
        path: String,
        args: Vec<String>,
        elevated: bool,
    ) -> tokio::task::JoinHandle<OperationResult> {
        let session = self.session(config);
        tokio::spawn(async move { session.run(&path, &args, elevated).await })
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

async fn next_question(rx: &mut broadcast::Receiver<BridgeEvent>) -> Question {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let BridgeEvent::QuestionAsked { question, .. } = rx.recv().await.unwrap() {
                return question;
            }
        }
    })
    .await
    .expect("no question was asked")
}

async fn finish(task: tokio::task::JoinHandle<OperationResult>) -> OperationResult {
    tokio::time::timeout(Duration::from_secs(20), task)
        .await
        .expect("session did not finish")
        .unwrap()
}

#[tokio::test]
async fn test_yes_no_answer_written_as_y() {
    let h = Harness::new();
    let worker = h.script(
        "worker",
        r#"echo "resolving dependencies..."
echo "QUESTION:Proceed with installation?" >&2
read answer
echo "answer=$answer""#,
    );
    let mut rx = h.events.subscribe();
    let task = h.spawn_run(SessionConfig::default(), worker, vec![], false);

    let question = next_question(&mut rx).await;
    assert_eq!(question.kind(), QuestionKind::YesNo);
    assert_eq!(question.spec.text, "Proceed with installation?");
    h.registry.resolve(question.id, 1).unwrap();

    let result = finish(task).await;
    assert!(result.success, "{:?}", result);
    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("resolving dependencies..."));
    assert!(result.output.contains("answer=y"));
    assert!(!result.error.contains("QUESTION"));
}

#[tokio::test]
async fn test_provider_frame_answered_by_index() {
    let h = Harness::new();
    let worker = h.script(
        "worker",
        r#"echo "BEGIN_PROVIDER:libfoo" >&2
echo "OPTION:1:foo-git" >&2
echo "OPTION:0:foo" >&2
echo "END_PROVIDER" >&2
read choice
echo "choice=$choice""#,
    );
    let mut rx = h.events.subscribe();
    let task = h.spawn_run(SessionConfig::default(), worker, vec![], false);

    let question = next_question(&mut rx).await;
    assert_eq!(question.kind(), QuestionKind::SelectProvider);
    assert_eq!(question.options(), ["foo", "foo-git"]);
    h.registry.resolve(question.id, 1).unwrap();

    let result = finish(task).await;
    assert!(result.success, "{:?}", result);
    assert!(result.output.contains("choice=1"));
}

#[tokio::test]
async fn test_empty_selection_frame_settled_without_asking() {
    let h = Harness::new();
    let worker = h.script(
        "worker",
        r#"echo "BEGIN_PROVIDER:libfoo" >&2
echo "END_PROVIDER" >&2
read choice
echo "choice=$choice"
echo "BEGIN_CONFLICT:foo conflicts with bar" >&2
echo "END_CONFLICT" >&2
read choice
echo "choice=$choice""#,
    );
    let mut rx = h.events.subscribe();
    // No question deadline: the session must still finish on its own.
    let task = h.spawn_run(SessionConfig::default(), worker, vec![], false);

    let result = finish(task).await;
    assert!(result.success, "{:?}", result);
    assert_eq!(result.output, "choice=0\nchoice=0\n");
    assert!(h.registry.is_empty());

    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(
                event,
                BridgeEvent::QuestionAsked { .. } | BridgeEvent::QuestionResolved { .. }
            ),
            "unexpected {:?}",
            event
        );
    }
}

#[tokio::test]
async fn test_questions_answered_in_order() {
    let h = Harness::new();
    let worker = h.script(
        "worker",
        r#"echo "QUESTION:First?" >&2
read a
echo "BEGIN_CONFLICT:foo conflicts with bar" >&2
echo "OPTION:0:keep foo" >&2
echo "OPTION:1:keep bar" >&2
echo "END_CONFLICT" >&2
read b
echo "got=$a,$b""#,
    );
    let mut rx = h.events.subscribe();
    let task = h.spawn_run(SessionConfig::default(), worker, vec![], false);

    let first = next_question(&mut rx).await;
    h.registry.resolve(first.id, 0).unwrap();
    let second = next_question(&mut rx).await;
    assert_eq!(second.kind(), QuestionKind::Conflict);
    // Duplicate answers race benignly
    h.registry.resolve(second.id, 1).unwrap();
    h.registry.resolve(second.id, 0).unwrap();

    let result = finish(task).await;
    assert!(result.output.contains("got=n,1"), "{:?}", result);
}

#[tokio::test]
async fn test_incorrect_password_invalidates_secret() {
    let h = Harness::new();
    h.secrets.store("hunter2");
    let worker = h.script(
        "worker",
        r#"echo "sudo: 1 incorrect password attempt" >&2
exit 1"#,
    );

    let result = finish(h.spawn_run(SessionConfig::default(), worker, vec![], false)).await;
    assert!(!result.success);
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.failure, Some(FailureKind::Authentication));
    assert!(!h.secrets.has_secret());
}

#[tokio::test]
async fn test_unanswered_question_times_out_to_default() {
    let h = Harness::new();
    let worker = h.script(
        "worker",
        r#"echo "QUESTION:Remove foo?" >&2
read answer
echo "answer=$answer""#,
    );
    let mut rx = h.events.subscribe();
    let config = SessionConfig {
        question_timeout: Some(Duration::from_millis(100)),
        ..SessionConfig::default()
    };
    let task = h.spawn_run(config, worker, vec![], false);

    let question = next_question(&mut rx).await;
    let result = finish(task).await;
    assert!(result.success, "{:?}", result);
    assert!(result.output.contains("answer=n"));

    let mut source = None;
    while let Ok(event) = rx.try_recv() {
        if let BridgeEvent::QuestionResolved {
            question_id,
            source: s,
            answer,
            ..
        } = event
        {
            assert_eq!(question_id, question.id);
            assert_eq!(answer, 0);
            source = Some(s);
        }
    }
    assert_eq!(source, Some(ResolutionSource::Timeout));
}

#[tokio::test]
async fn test_secret_written_once_through_elevation() {
    let h = Harness::new();
    h.secrets.store("hunter2");
    let sudo = h.script(
        "fake-sudo",
        r#"printf '[sudo] password for tester: ' >&2
read pw
if [ "$pw" != "hunter2" ]; then
  echo "Sorry, try again." >&2
  exit 1
fi
exec "$@""#,
    );
    let worker = h.script(
        "worker",
        r#"echo "QUESTION:Proceed?" >&2
read answer
echo "args=$* answer=$answer""#,
    );
    let config = SessionConfig {
        elevation: ElevationConfig {
            program: sudo,
            args: vec![],
        },
        ..SessionConfig::default()
    };
    let mut rx = h.events.subscribe();
    let task = h.spawn_run(config, worker, vec!["install".into(), "foo".into()], true);

    let question = next_question(&mut rx).await;
    h.registry.resolve(question.id, 1).unwrap();

    let result = finish(task).await;
    assert!(result.success, "{:?}", result);
    assert!(result.output.contains("args=install foo answer=y"));
    assert!(!result.error.contains("password"));
    assert!(!result.output.contains("hunter2"));
    assert!(!result.error.contains("hunter2"));
}

#[tokio::test]
async fn test_repeated_prompt_never_resends_secret() {
    let h = Harness::new();
    h.secrets.store("wrong");
    let sudo = h.script(
        "fake-sudo",
        r#"printf 'Password: ' >&2
read first
echo "Sorry, try again." >&2
printf 'Password: ' >&2
if read second; then
  echo "second=$second"
fi
echo "first=$first"
echo "sudo: 2 incorrect password attempts" >&2
exit 1"#,
    );
    let config = SessionConfig {
        elevation: ElevationConfig {
            program: sudo,
            args: vec![],
        },
        ..SessionConfig::default()
    };

    let result = finish(h.spawn_run(config, "/bin/true".into(), vec![], true)).await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Authentication));
    assert!(result.output.contains("first=wrong"));
    assert!(!result.output.contains("second="));
    assert!(!h.secrets.has_secret());
}

#[tokio::test]
async fn test_prompt_without_secret_gives_up() {
    let h = Harness::new();
    let sudo = h.script(
        "fake-sudo",
        r#"printf 'Password: ' >&2
if ! read pw; then
  echo "sudo: no password was provided" >&2
  exit 1
fi
exec "$@""#,
    );
    let config = SessionConfig {
        elevation: ElevationConfig {
            program: sudo,
            args: vec![],
        },
        ..SessionConfig::default()
    };

    let result = finish(h.spawn_run(config, "/bin/true".into(), vec![], true)).await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::SecretUnavailable));
}

#[tokio::test]
async fn test_exit_with_question_open_settles_default() {
    let h = Harness::new();
    let worker = h.script("worker", r#"echo "QUESTION:Continue?" >&2"#);
    let mut rx = h.events.subscribe();

    let result = finish(h.spawn_run(SessionConfig::default(), worker, vec![], false)).await;
    assert!(!result.success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.failure, Some(FailureKind::Interrupted));
    assert!(h.registry.is_empty());

    let mut resolved = 0;
    while let Ok(event) = rx.try_recv() {
        if let BridgeEvent::QuestionResolved { source, .. } = event {
            assert_eq!(source, ResolutionSource::Cancelled);
            resolved += 1;
        }
    }
    assert_eq!(resolved, 1);
}

#[tokio::test]
async fn test_spawn_failure_is_minus_one() {
    let h = Harness::new();
    let missing = h.root.join("no-such-worker").to_string_lossy().into_owned();

    let result = finish(h.spawn_run(SessionConfig::default(), missing, vec![], false)).await;
    assert!(!result.success);
    assert_eq!(result.exit_code, -1);
    assert_eq!(result.failure, Some(FailureKind::Spawn));
    assert!(!result.error.is_empty());
}

#[tokio::test]
async fn test_plain_stderr_kept_as_error_text() {
    let h = Harness::new();
    let worker = h.script(
        "worker",
        r#"echo "warning: foo-1.0 is up to date -- reinstalling" >&2
echo "OPTION:0:stray" >&2
echo "error: failed to commit transaction" >&2
exit 1"#,
    );

    let result = finish(h.spawn_run(SessionConfig::default(), worker, vec![], false)).await;
    assert_eq!(result.failure, Some(FailureKind::Transaction));
    assert!(result.error.contains("warning: foo-1.0 is up to date"));
    assert!(result.error.contains("failed to commit transaction"));
    assert!(!result.error.contains("stray"));
}

#[tokio::test]
async fn test_drain_deadline_bounds_whole_exit_phase() {
    let h = Harness::new();
    // The background sleep keeps stdout and stderr open after the worker exits.
    let worker = h.script(
        "worker",
        r#"echo "done"
sleep 4 &
exit 0"#,
    );
    let config = SessionConfig {
        drain_timeout: Duration::from_secs(1),
        ..SessionConfig::default()
    };
    let started = std::time::Instant::now();
    let result = finish(h.spawn_run(config, worker, vec![], false)).await;
    let elapsed = started.elapsed();

    assert_eq!(result.exit_code, 0);
    assert!(
        elapsed < Duration::from_millis(1800),
        "exit phase took {:?}",
        elapsed
    );
}
