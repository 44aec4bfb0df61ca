//! Out-of-band checks against the system's elevation mechanism

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::secure_string::SecureString;

/// Default time allowed for a single probe process
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Checks the elevation secret without running a real transaction.
///
/// Both calls may spawn processes; callers must not hold a UI thread while
/// awaiting them.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ElevationProbe: Send + Sync {
    /// Whether the current account needs a secret at all
    async fn requires_secret(&self) -> bool;

    /// Whether the elevation tool accepts `secret`
    async fn validate(&self, secret: &SecureString) -> bool;
}

/// Probe backed by the real elevation tool and the account status command.
///
/// Validation runs `<program> -S -k -p "" true` with the secret on stdin; the
/// account probe runs `passwd -S <user>` and treats an `NP` status as "no
/// password set".
#[derive(Debug, Clone)]
pub struct SystemProbe {
    program: String,
    account_status_program: String,
    timeout: Duration,
}

impl SystemProbe {
    /// Create a probe for the given elevation program (usually `sudo`)
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            account_status_program: "passwd".to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the per-probe timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn current_user() -> Option<String> {
        std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .ok()
            .filter(|u| !u.is_empty())
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new("sudo")
    }
}

/// Parse `passwd -S` output; the second field is the password status.
pub(crate) fn account_has_no_password(status_line: &str) -> bool {
    status_line.split_whitespace().nth(1) == Some("NP")
}

#[async_trait::async_trait]
impl ElevationProbe for SystemProbe {
    async fn requires_secret(&self) -> bool {
        let Some(user) = Self::current_user() else {
            return true;
        };

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.account_status_program)
                .arg("-S")
                .arg(&user)
                .stdin(Stdio::null())
                .output(),
        )
        .await;

        match output {
            Ok(Ok(out)) if out.status.success() => {
                let status = String::from_utf8_lossy(&out.stdout);
                let no_password = account_has_no_password(&status);
                debug!(user = %user, no_password, "Account status probed");
                !no_password
            }
            Ok(Ok(out)) => {
                debug!(code = ?out.status.code(), "Account status probe failed");
                true
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Account status probe could not run");
                true
            }
            Err(_) => {
                warn!("Account status probe timed out");
                true
            }
        }
    }

    async fn validate(&self, secret: &SecureString) -> bool {
        let child = Command::new(&self.program)
            .args(["-S", "-k", "-p", "", "true"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!(program = %self.program, error = %e, "Failed to spawn validation probe");
                return false;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let line = secret.to_line();
            if let Err(e) = stdin.write_all(&line).await {
                debug!(error = %e, "Validation probe closed stdin early");
            }
            drop(stdin);
        }

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                warn!(error = %e, "Validation probe wait failed");
                false
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Validation probe timed out");
                false
            }
        }
    }
}
