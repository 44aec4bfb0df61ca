//! Serialized writer for the worker's standard input

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::secret::SecureString;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The one writer of a worker's stdin.
///
/// Secret injection and answer writing fire from different handlers; both go
/// through this mutex so their bytes never interleave. Every write is flushed
/// immediately.
pub struct StdinWriter {
    inner: Mutex<Option<BoxedWriter>>,
    closed: AtomicBool,
}

impl StdinWriter {
    /// Wrap a child's stdin (or any async writer)
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Mutex::new(Some(Box::new(writer))),
            closed: AtomicBool::new(false),
        }
    }

    /// Write one already newline-terminated answer line
    pub async fn write_line(&self, line: &str) -> Result<()> {
        debug!(line = %line.trim_end(), "Writing answer to worker");
        self.write_bytes(line.as_bytes()).await
    }

    /// Write the secret followed by a newline; the buffer is wiped afterwards
    pub async fn write_secret(&self, secret: &SecureString) -> Result<()> {
        let line = secret.to_line();
        self.write_bytes(&line).await
    }

    /// Close the stream. Returns true if this call closed it.
    pub async fn close(&self) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.take() {
            Some(mut writer) => {
                if let Err(e) = writer.shutdown().await {
                    debug!(error = %e, "Worker stdin already gone at close");
                }
                self.closed.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Whether the stream has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(Error::StdinClosed)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}
