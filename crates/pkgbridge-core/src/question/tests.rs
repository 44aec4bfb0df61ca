use super::*;
use crate::event_bus::{BridgeEvent, EventBus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn provider_spec() -> QuestionSpec {
    QuestionSpec::provider("libfoo", vec!["foo".to_string(), "foo-git".to_string()])
}

#[test]
fn test_spec_constructors() {
    let spec = provider_spec();
    assert_eq!(spec.kind, QuestionKind::SelectProvider);
    assert_eq!(spec.subject.as_deref(), Some("libfoo"));
    assert!(spec.text.contains("libfoo"));

    let spec = QuestionSpec::conflict("", vec!["keep".to_string()]);
    assert_eq!(spec.text, "Resolve package conflict");
    assert!(spec.subject.is_none());
}

#[test]
fn test_check_answer() {
    let spec = provider_spec();
    assert!(spec.check_answer(0).is_ok());
    assert!(spec.check_answer(1).is_ok());
    assert_eq!(
        spec.check_answer(2),
        Err(QuestionError::OptionOutOfRange { value: 2, len: 2 })
    );

    let yes_no = QuestionSpec::yes_no("Proceed?");
    assert!(yes_no.check_answer(1).is_ok());
    assert_eq!(yes_no.check_answer(2), Err(QuestionError::InvalidYesNo(2)));
}

#[test]
fn test_empty_selection_is_unanswerable() {
    assert!(provider_spec().is_answerable());
    assert!(QuestionSpec::yes_no("Proceed?").is_answerable());

    let empty = QuestionSpec::provider("libfoo", Vec::new());
    assert!(!empty.is_answerable());
    assert!(empty.check_answer(0).is_err());
    assert!(!QuestionSpec::conflict("foo conflicts with bar", Vec::new()).is_answerable());
}

#[test]
fn test_default_answers_clamped() {
    let defaults = DefaultAnswers {
        yes_no: 1,
        selection: 5,
    };
    assert_eq!(defaults.for_question(&QuestionSpec::yes_no("ok?")), 1);
    // Out-of-range selection default falls back to the first option
    assert_eq!(defaults.for_question(&provider_spec()), 0);

    let defaults = DefaultAnswers::default();
    assert_eq!(defaults.for_question(&QuestionSpec::yes_no("ok?")), 0);
}

#[tokio::test]
async fn test_open_publishes_once() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let registry = QuestionRegistry::new(bus);
    let session_id = Uuid::new_v4();

    let handle = registry.open(session_id, provider_spec(), 0, None);
    assert_eq!(registry.len(), 1);

    match rx.recv().await.unwrap() {
        BridgeEvent::QuestionAsked {
            session_id: sid,
            question,
        } => {
            assert_eq!(sid, session_id);
            assert_eq!(question.id, handle.id());
            assert_eq!(question.options(), ["foo", "foo-git"]);
            assert!(question.answer.is_none());
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_resolve_wakes_waiter() {
    let registry = QuestionRegistry::new(EventBus::default());
    let handle = registry.open(Uuid::new_v4(), provider_spec(), 0, None);
    let id = handle.id();

    let waiter = tokio::spawn(handle.answer());
    assert_eq!(registry.resolve(id, 1), Ok(ResolveOutcome::Resolved));

    let resolution = waiter.await.unwrap();
    assert_eq!(resolution.value, 1);
    assert_eq!(resolution.source, ResolutionSource::User);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_double_resolve_is_idempotent() {
    let registry = QuestionRegistry::new(EventBus::default());
    let handle = registry.open(Uuid::new_v4(), provider_spec(), 0, None);
    let id = handle.id();

    assert_eq!(registry.resolve(id, 1), Ok(ResolveOutcome::Resolved));
    assert_eq!(registry.resolve(id, 0), Ok(ResolveOutcome::AlreadyResolved));

    assert_eq!(handle.answer().await.value, 1);
}

#[tokio::test]
async fn test_out_of_range_keeps_question_open() {
    let registry = QuestionRegistry::new(EventBus::default());
    let handle = registry.open(Uuid::new_v4(), provider_spec(), 0, None);
    let id = handle.id();

    assert!(registry.resolve(id, 2).is_err());
    assert!(registry.get(id).is_some());

    assert_eq!(registry.resolve(id, 0), Ok(ResolveOutcome::Resolved));
    assert_eq!(handle.answer().await.value, 0);
}

#[tokio::test]
async fn test_deadline_applies_default() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let registry = QuestionRegistry::new(bus);
    let handle = registry.open(
        Uuid::new_v4(),
        QuestionSpec::yes_no("Proceed?"),
        0,
        Some(Duration::from_millis(20)),
    );
    let id = handle.id();
    assert!(handle.question().expires_at.is_some());

    let resolution = handle.answer().await;
    assert_eq!(resolution.value, 0);
    assert_eq!(resolution.source, ResolutionSource::Timeout);
    assert!(registry.is_empty());

    // A late answer is a harmless no-op
    assert_eq!(registry.resolve(id, 1), Ok(ResolveOutcome::AlreadyResolved));

    let _asked = rx.recv().await.unwrap();
    match rx.recv().await.unwrap() {
        BridgeEvent::QuestionResolved { source, answer, .. } => {
            assert_eq!(source, ResolutionSource::Timeout);
            assert_eq!(answer, 0);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_applies_default() {
    let registry = QuestionRegistry::new(EventBus::default());
    let handle = registry.open(Uuid::new_v4(), provider_spec(), 1, None);
    let cancel = CancellationToken::new();

    let waiter = tokio::spawn({
        let cancel = cancel.clone();
        async move { handle.answer_or_cancel(&cancel).await }
    });
    cancel.cancel();

    let resolution = waiter.await.unwrap();
    assert_eq!(resolution.value, 1);
    assert_eq!(resolution.source, ResolutionSource::Cancelled);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_dropped_handle_leaves_no_entry() {
    let registry = QuestionRegistry::new(EventBus::default());
    let handle = registry.open(Uuid::new_v4(), provider_spec(), 0, None);
    let id = handle.id();
    drop(handle);

    assert!(registry.get(id).is_none());
    assert_eq!(registry.resolve(id, 0), Ok(ResolveOutcome::AlreadyResolved));
}

#[tokio::test]
async fn test_pending_snapshot_in_order() {
    let registry = QuestionRegistry::new(EventBus::default());
    let session_id = Uuid::new_v4();
    let first = registry.open(session_id, QuestionSpec::yes_no("one"), 0, None);
    tokio::time::sleep(Duration::from_millis(2)).await;
    let second = registry.open(session_id, QuestionSpec::yes_no("two"), 0, None);

    let pending = registry.pending();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, first.id());
    assert_eq!(pending[1].id, second.id());
}
