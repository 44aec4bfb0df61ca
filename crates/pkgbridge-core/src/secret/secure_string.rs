//! Secure string implementation with memory wiping

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// A string that is wiped from memory when cleared or dropped
///
/// # Security
///
/// - Value is zeroized on drop (via `ZeroizeOnDrop`)
/// - Debug and Display implementations redact the value
/// - Equality is constant-time
///
/// # Example
///
/// ```
/// use pkgbridge_core::secret::SecureString;
///
/// let secret = SecureString::new("hunter2");
/// assert_eq!(secret.expose(), "hunter2");
/// assert!(!format!("{:?}", secret).contains("hunter2"));
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Temporarily expose the string value
    ///
    /// The returned reference should not be stored or cloned unnecessarily.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Render the value as a newline-terminated line for a child's stdin.
    ///
    /// The buffer is wiped when dropped.
    #[must_use]
    pub fn to_line(&self) -> Zeroizing<Vec<u8>> {
        let mut line = Zeroizing::new(Vec::with_capacity(self.inner.len() + 1));
        line.extend_from_slice(self.inner.as_bytes());
        line.push(b'\n');
        line
    }

    /// Get the length of the secret in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Zeroize the value and leave an empty string behind
    pub fn clear(&mut self) {
        self.inner.zeroize();
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED, {} bytes])", self.inner.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecureString {}
