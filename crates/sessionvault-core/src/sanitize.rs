//! Sanitization gateway port.
//!
//! All user- and assistant-originated text destined for durable storage goes
//! through a [`Sanitizer`]. The rule engine itself is an adapter concern; the
//! regex implementation lives in sessionvault-infra.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Which rule set applies to a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SanitizeScope {
    /// Message bodies and summaries: content-preserving, strips active content.
    Message,
    /// Display names typed by the user: strict, strips all markup.
    UserInput,
}

impl fmt::Display for SanitizeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanitizeScope::Message => write!(f, "message"),
            SanitizeScope::UserInput => write!(f, "user_input"),
        }
    }
}

/// Result of a successful sanitizer pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    /// Number of dangerous constructs removed.
    pub threats_found: u32,
}

impl Sanitized {
    /// Text that needed no changes.
    pub fn clean(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            threats_found: 0,
        }
    }
}

/// A sanitizer that could not process its input.
#[derive(Debug, Clone, Error)]
#[error("sanitizer rejected {scope} input: {reason}")]
pub struct SanitizeError {
    pub scope: SanitizeScope,
    pub reason: String,
}

/// Cleans untrusted text according to a declared scope.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, text: &str, scope: SanitizeScope) -> Result<Sanitized, SanitizeError>;
}

impl<T: Sanitizer + ?Sized> Sanitizer for Arc<T> {
    fn sanitize(&self, text: &str, scope: SanitizeScope) -> Result<Sanitized, SanitizeError> {
        (**self).sanitize(text, scope)
    }
}
