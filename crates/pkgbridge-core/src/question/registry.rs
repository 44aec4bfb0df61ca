use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{
    Question, QuestionError, QuestionSpec, Resolution, ResolutionSource, ResolveOutcome,
};
use crate::event_bus::{BridgeEvent, EventBus};

struct PendingQuestion {
    question: Question,
    resolver: oneshot::Sender<Resolution>,
}

struct RegistryInner {
    pending: Mutex<HashMap<Uuid, PendingQuestion>>,
    events: EventBus,
}

/// Registry of open questions.
///
/// Each open question is backed by a oneshot channel, so a waiter wakes the
/// moment the answer arrives and exactly one answer is ever delivered.
/// Cloning is cheap; clones share the same set of pending questions.
#[derive(Clone)]
pub struct QuestionRegistry {
    inner: Arc<RegistryInner>,
}

impl QuestionRegistry {
    /// Create a registry publishing on `events`
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pending: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Open and publish a question.
    ///
    /// `default` is applied if the handle's deadline passes or the session is
    /// cancelled before anyone answers. `spec` must be
    /// [answerable](QuestionSpec::is_answerable).
    pub fn open(
        &self,
        session_id: Uuid,
        spec: QuestionSpec,
        default: usize,
        deadline: Option<Duration>,
    ) -> QuestionHandle {
        let question = Question::new(session_id, spec, deadline);
        let (tx, rx) = oneshot::channel();

        self.lock().insert(
            question.id,
            PendingQuestion {
                question: question.clone(),
                resolver: tx,
            },
        );

        info!(
            session_id = %session_id,
            question_id = %question.id,
            kind = %question.kind(),
            options = question.options().len(),
            "Question opened"
        );
        self.inner.events.publish(BridgeEvent::QuestionAsked {
            session_id,
            question: question.clone(),
        });

        QuestionHandle {
            id: question.id,
            question,
            registry: self.clone(),
            rx,
            default,
            deadline,
        }
    }

    /// Answer an open question.
    ///
    /// The first valid answer wins; later calls for the same question return
    /// `Ok(AlreadyResolved)` and change nothing. An out-of-range answer is
    /// rejected and the question stays open.
    pub fn resolve(&self, id: Uuid, value: usize) -> Result<ResolveOutcome, QuestionError> {
        let mut pending = self.lock();
        if let Some(entry) = pending.get(&id) {
            entry.question.spec.check_answer(value)?;
        }
        let Some(entry) = pending.remove(&id) else {
            debug!(question_id = %id, "Ignoring answer for settled question");
            return Ok(ResolveOutcome::AlreadyResolved);
        };
        drop(pending);
        self.settle(entry, value, ResolutionSource::User);
        Ok(ResolveOutcome::Resolved)
    }

    /// Snapshot of all open questions, oldest first
    #[must_use]
    pub fn pending(&self) -> Vec<Question> {
        let mut open: Vec<Question> = self.lock().values().map(|p| p.question.clone()).collect();
        open.sort_by_key(|q| q.created_at);
        open
    }

    /// Get an open question by ID
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Question> {
        self.lock().get(&id).map(|p| p.question.clone())
    }

    /// Number of open questions
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no question is open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `value` if the question is still open. Returns false if it was
    /// already settled.
    fn finish(&self, id: Uuid, value: usize, source: ResolutionSource) -> bool {
        let entry = self.lock().remove(&id);
        match entry {
            Some(entry) => {
                self.settle(entry, value, source);
                true
            }
            None => false,
        }
    }

    fn settle(&self, mut entry: PendingQuestion, value: usize, source: ResolutionSource) {
        entry.question.answer = Some(value);
        let question = entry.question;
        info!(
            question_id = %question.id,
            answer = value,
            source = ?source,
            "Question resolved"
        );
        let _ = entry.resolver.send(Resolution { value, source });
        self.inner.events.publish(BridgeEvent::QuestionResolved {
            session_id: question.session_id,
            question_id: question.id,
            answer: value,
            source,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, PendingQuestion>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Awaitable side of one open question
pub struct QuestionHandle {
    id: Uuid,
    question: Question,
    registry: QuestionRegistry,
    rx: oneshot::Receiver<Resolution>,
    default: usize,
    deadline: Option<Duration>,
}

impl QuestionHandle {
    /// Question ID
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The question as published
    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Wait for the answer, or the default once the deadline passes
    pub async fn answer(self) -> Resolution {
        self.answer_or_cancel(&CancellationToken::new()).await
    }

    /// Wait for the answer; apply the default on deadline or cancellation
    pub async fn answer_or_cancel(mut self, cancel: &CancellationToken) -> Resolution {
        let deadline = self.deadline;
        let source = tokio::select! {
            result = &mut self.rx => match result {
                Ok(resolution) => return resolution,
                Err(_) => ResolutionSource::Cancelled,
            },
            _ = deadline_elapsed(deadline) => ResolutionSource::Timeout,
            _ = cancel.cancelled() => ResolutionSource::Cancelled,
        };
        self.settle_default(source)
    }

    fn settle_default(&mut self, source: ResolutionSource) -> Resolution {
        if self.registry.finish(self.id, self.default, source) {
            return Resolution {
                value: self.default,
                source,
            };
        }
        // A user answer raced the deadline and won.
        self.rx.try_recv().unwrap_or(Resolution {
            value: self.default,
            source,
        })
    }
}

impl Drop for QuestionHandle {
    fn drop(&mut self) {
        if self.registry.lock().remove(&self.id).is_some() {
            debug!(question_id = %self.id, "Dropped unanswered question");
        }
    }
}

async fn deadline_elapsed(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}
