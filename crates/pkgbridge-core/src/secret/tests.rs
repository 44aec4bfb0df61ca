//! Tests for secret module

use super::probe::account_has_no_password;
use super::*;
use crate::event_bus::{BridgeEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;

fn probe(requires: bool, accepts: bool) -> Arc<MockElevationProbe> {
    let mut probe = MockElevationProbe::new();
    probe.expect_requires_secret().returning(move || requires);
    probe.expect_validate().returning(move |_| accepts);
    Arc::new(probe)
}

#[test]
fn test_secure_string_redacted() {
    let secret = SecureString::new("my-secret-value");
    assert_eq!(secret.expose(), "my-secret-value");
    assert_eq!(secret.len(), 15);

    let debug = format!("{:?}", secret);
    assert!(!debug.contains("my-secret-value"));
    assert!(debug.contains("REDACTED"));
    assert_eq!(format!("{}", secret), "[REDACTED]");
}

#[test]
fn test_secure_string_line_and_clear() {
    let mut secret = SecureString::new("pw");
    assert_eq!(secret.to_line().as_slice(), b"pw\n");

    secret.clear();
    assert!(secret.is_empty());
}

#[test]
fn test_account_status_parsing() {
    assert!(account_has_no_password("alice NP 2024-01-01 0 99999 7 -1"));
    assert!(!account_has_no_password("alice P 2024-01-01 0 99999 7 -1"));
    assert!(!account_has_no_password("alice L 2024-01-01"));
    assert!(!account_has_no_password(""));
}

#[test]
fn test_store_and_has_secret() {
    let store = SecretStore::new(probe(true, true), SecretStoreConfig::default());
    assert!(!store.has_secret());

    store.store("hunter2");
    assert!(store.has_secret());
    assert!(!store.is_validated());
    assert_eq!(store.secret_for_prompt().unwrap().expose(), "hunter2");

    store.clear();
    assert!(!store.has_secret());
    assert!(store.secret_for_prompt().is_none());
}

#[test]
fn test_expired_secret_is_absent() {
    let store = SecretStore::new(
        probe(true, true),
        SecretStoreConfig {
            ttl: Duration::from_millis(1),
            request_timeout: None,
        },
    );
    store.store("hunter2");
    std::thread::sleep(Duration::from_millis(20));

    assert!(store.is_expired());
    assert!(!store.has_secret());
    // Already cleared, nothing left to expire
    assert!(!store.is_expired());
}

#[tokio::test]
async fn test_validate_success_marks_valid() {
    let store = SecretStore::new(probe(true, true), SecretStoreConfig::default());
    store.store("hunter2");

    assert!(store.validate().await);
    assert!(store.is_validated());
}

#[tokio::test]
async fn test_validate_failure_clears() {
    let store = SecretStore::new(probe(true, false), SecretStoreConfig::default());
    store.store("wrong");

    assert!(!store.validate().await);
    assert!(!store.has_secret());
}

#[tokio::test]
async fn test_validate_without_secret() {
    let mut mock = MockElevationProbe::new();
    mock.expect_validate().never();
    let store = SecretStore::new(Arc::new(mock), SecretStoreConfig::default());

    assert!(!store.validate().await);
}

#[tokio::test]
async fn test_request_returns_immediately_when_validated() {
    let mut mock = MockElevationProbe::new();
    mock.expect_requires_secret().never();
    mock.expect_validate().times(1).returning(|_| true);
    let store = SecretStore::new(Arc::new(mock), SecretStoreConfig::default());

    store.store("hunter2");
    assert!(store.validate().await);
    assert!(store.request_secret("install").await);
}

#[tokio::test]
async fn test_request_without_password_account() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let store =
        SecretStore::new(probe(false, false), SecretStoreConfig::default()).with_event_bus(bus);

    assert!(store.request_secret("install").await);
    assert!(store.is_validated());
    // The sentinel is never offered to a password prompt
    assert!(store.secret_for_prompt().is_none());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_requests_coalesce() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let store = Arc::new(
        SecretStore::new(probe(true, true), SecretStoreConfig::default()).with_event_bus(bus),
    );

    let a = tokio::spawn({
        let store = store.clone();
        async move { store.request_secret("install").await }
    });
    let b = tokio::spawn({
        let store = store.clone();
        async move { store.request_secret("remove").await }
    });

    // Exactly one notification for both callers
    let first = rx.recv().await.unwrap();
    assert!(matches!(first, BridgeEvent::SecretRequired { .. }));
    while store.pending_requests() < 2 {
        tokio::task::yield_now().await;
    }

    store.store("hunter2");
    assert!(store.complete_request(true).await);

    assert!(a.await.unwrap());
    assert!(b.await.unwrap());
    assert!(matches!(
        rx.recv().await.unwrap(),
        BridgeEvent::SecretResolved { accepted: true }
    ));
}

#[tokio::test]
async fn test_declined_request_resolves_false() {
    let store = Arc::new(SecretStore::new(
        probe(true, true),
        SecretStoreConfig::default(),
    ));

    let waiter = tokio::spawn({
        let store = store.clone();
        async move { store.request_secret("upgrade").await }
    });
    while store.pending_requests() < 1 {
        tokio::task::yield_now().await;
    }

    store.store("typed-then-cancelled");
    assert!(!store.complete_request(false).await);
    assert!(!waiter.await.unwrap());
    assert!(!store.has_secret());
}

#[tokio::test]
async fn test_rejected_secret_resolves_false() {
    let store = Arc::new(SecretStore::new(
        probe(true, false),
        SecretStoreConfig::default(),
    ));

    let waiter = tokio::spawn({
        let store = store.clone();
        async move { store.request_secret("sync").await }
    });
    while store.pending_requests() < 1 {
        tokio::task::yield_now().await;
    }

    store.store("wrong");
    assert!(!store.complete_request(true).await);
    assert!(!waiter.await.unwrap());
    assert!(!store.has_secret());
}

#[tokio::test]
async fn test_request_times_out() {
    let store = SecretStore::new(
        probe(true, true),
        SecretStoreConfig {
            ttl: DEFAULT_SECRET_TTL,
            request_timeout: Some(Duration::from_millis(20)),
        },
    );

    assert!(!store.request_secret("install").await);
    assert_eq!(store.pending_requests(), 0);
}

#[test]
fn test_invalidate_clears() {
    let store = SecretStore::new(probe(true, true), SecretStoreConfig::default());
    store.store("hunter2");
    store.invalidate("incorrect password");
    assert!(!store.has_secret());
}
