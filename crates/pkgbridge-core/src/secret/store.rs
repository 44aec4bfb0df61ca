//! Secret store implementation

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::probe::ElevationProbe;
use super::secure_string::SecureString;
use crate::event_bus::{BridgeEvent, EventBus};

/// Default time-to-live of a stored secret (9 minutes)
pub const DEFAULT_SECRET_TTL: Duration = Duration::from_secs(9 * 60);

/// Sentinel stored when the account needs no secret at all.
///
/// Never written to a child process.
pub const NO_SECRET_REQUIRED: &str = "\0pkgbridge:no-secret-required";

/// Secret store configuration
#[derive(Debug, Clone)]
pub struct SecretStoreConfig {
    /// Age after which a secret is treated as absent
    pub ttl: Duration,
    /// How long `request_secret` waits for the user (`None` waits forever)
    pub request_timeout: Option<Duration>,
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SECRET_TTL,
            request_timeout: None,
        }
    }
}

struct SecretRecord {
    value: SecureString,
    stored_at: Instant,
    validated_at: Option<Instant>,
    valid: bool,
}

impl SecretRecord {
    fn new(value: SecureString) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            validated_at: None,
            valid: false,
        }
    }

    fn age(&self) -> Duration {
        self.validated_at.unwrap_or(self.stored_at).elapsed()
    }

    fn is_sentinel(&self) -> bool {
        self.value.expose() == NO_SECRET_REQUIRED
    }
}

/// Shared holder of the elevation secret.
///
/// One instance is constructed by the application and handed to every
/// session and facade that needs it. The record has its own lock, independent
/// of any session, so a lookup never waits on a session that is mid-drain.
pub struct SecretStore {
    record: RwLock<Option<SecretRecord>>,
    waiters: Mutex<Vec<oneshot::Sender<bool>>>,
    probe: Arc<dyn ElevationProbe>,
    events: Option<EventBus>,
    config: SecretStoreConfig,
}

impl SecretStore {
    /// Create a store that validates through `probe`
    #[must_use]
    pub fn new(probe: Arc<dyn ElevationProbe>, config: SecretStoreConfig) -> Self {
        Self {
            record: RwLock::new(None),
            waiters: Mutex::new(Vec::new()),
            probe,
            events: None,
            config,
        }
    }

    /// Publish `SecretRequired`/`SecretResolved` on this bus
    #[must_use]
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Record a secret supplied by the user. It starts out unvalidated.
    pub fn store(&self, secret: impl Into<String>) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        *record = Some(SecretRecord::new(SecureString::new(secret)));
        debug!("Elevation secret stored");
    }

    /// Whether an unexpired secret (validated or not) is held
    #[must_use]
    pub fn has_secret(&self) -> bool {
        if self.is_expired() {
            return false;
        }
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// True, and clears the record, if the held secret is older than the TTL
    pub fn is_expired(&self) -> bool {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        match record.as_ref() {
            Some(r) if r.age() > self.config.ttl => {
                debug!(ttl_secs = self.config.ttl.as_secs(), "Elevation secret expired");
                *record = None;
                true
            }
            _ => false,
        }
    }

    /// Whether an unexpired secret has passed validation
    #[must_use]
    pub fn is_validated(&self) -> bool {
        !self.is_expired()
            && self
                .record
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(|r| r.valid)
    }

    /// The secret to answer an elevation prompt with.
    ///
    /// `None` when nothing is stored, the record expired, or the account
    /// needs no secret (the sentinel is never handed out).
    #[must_use]
    pub fn secret_for_prompt(&self) -> Option<SecureString> {
        if self.is_expired() {
            return None;
        }
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|r| !r.is_sentinel())
            .map(|r| r.value.clone())
    }

    /// Wipe and drop the held secret
    pub fn clear(&self) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut r) = record.take() {
            r.value.clear();
        }
    }

    /// Drop a secret the elevation tool rejected so the next call re-prompts
    pub fn invalidate(&self, reason: &str) {
        warn!(reason = %reason, "Invalidating elevation secret");
        self.clear();
    }

    /// Validate the held secret out-of-band.
    ///
    /// On success the record is marked valid and its age restarts; on failure
    /// the secret is cleared. Never fails with an error.
    pub async fn validate(&self) -> bool {
        let secret = {
            let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
            match record.as_ref() {
                Some(r) if r.is_sentinel() => return true,
                Some(r) => r.value.clone(),
                None => return false,
            }
        };

        let accepted = self.probe.validate(&secret).await;

        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        if accepted {
            // The record may have been replaced while the probe ran.
            if let Some(r) = record.as_mut().filter(|r| r.value == secret) {
                r.valid = true;
                r.validated_at = Some(Instant::now());
            }
            info!("Elevation secret validated");
        } else {
            if let Some(mut r) = record.take() {
                r.value.clear();
            }
            warn!("Elevation secret rejected by validation probe");
        }
        accepted
    }

    /// Make sure a usable secret is available.
    ///
    /// Returns immediately when a validated, unexpired secret is held, or
    /// when the account needs no secret. Otherwise publishes one
    /// `SecretRequired` event for all concurrently waiting callers and waits
    /// for [`complete_request`](Self::complete_request).
    pub async fn request_secret(&self, reason: &str) -> bool {
        if self.is_validated() {
            return true;
        }

        if !self.probe.requires_secret().await {
            let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
            let mut sentinel = SecretRecord::new(SecureString::new(NO_SECRET_REQUIRED));
            sentinel.valid = true;
            *record = Some(sentinel);
            debug!("Account needs no elevation secret");
            return true;
        }

        let (tx, rx) = oneshot::channel();
        let first = {
            let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
            waiters.retain(|w| !w.is_closed());
            waiters.push(tx);
            waiters.len() == 1
        };

        if first {
            info!(reason = %reason, "Elevation secret required");
            if let Some(bus) = &self.events {
                bus.publish(BridgeEvent::SecretRequired {
                    reason: reason.to_string(),
                });
            }
        }

        match self.config.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(result) => result.unwrap_or(false),
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Secret request timed out");
                    false
                }
            },
            None => rx.await.unwrap_or(false),
        }
    }

    /// Finish the pending secret request.
    ///
    /// When `accepted`, the secret stored beforehand is validated; every
    /// waiter receives the validation outcome. Otherwise state is cleared and
    /// waiters receive `false`.
    pub async fn complete_request(&self, accepted: bool) -> bool {
        let outcome = if accepted {
            self.validate().await
        } else {
            self.clear();
            false
        };

        let waiters = std::mem::take(
            &mut *self.waiters.lock().unwrap_or_else(PoisonError::into_inner),
        );
        debug!(waiters = waiters.len(), outcome, "Completing secret request");
        for waiter in waiters {
            let _ = waiter.send(outcome);
        }

        if let Some(bus) = &self.events {
            bus.publish(BridgeEvent::SecretResolved { accepted: outcome });
        }
        outcome
    }

    /// Number of callers currently waiting in `request_secret`
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|w| !w.is_closed())
            .count()
    }
}
