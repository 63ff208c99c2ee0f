//! Artifact source error types.
//!
//! The watcher never acts on a failed listing, so the only question an error
//! has to answer is whether retrying soon could help:
//!
//! - **Transient** errors are retriable (5xx, rate limits, network failures)
//! - **Permanent** errors will not go away by themselves (most 4xx)
//!
//! Both kinds end in a rescheduled check; the kind only decides whether the
//! client retries inline first.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// The kind of source error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Safe to retry with backoff.
    Transient,
    /// Retrying with the same request will fail again.
    Permanent,
}

impl SourceErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, SourceErrorKind::Transient)
    }
}

/// An error from the artifact source.
#[derive(Debug, Error)]
pub struct SourceError {
    pub kind: SourceErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "artifact source error (HTTP {}): {}", code, self.message),
            None => write!(f, "artifact source error: {}", self.message),
        }
    }
}

impl SourceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error for an HTTP response with the given status.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify(Some(status_code), &message),
            status_code: Some(status_code),
            message,
            source: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

/// Categorizes an error by status code and message.
pub fn classify(status_code: Option<u16>, message: &str) -> SourceErrorKind {
    if is_transient_message(message) {
        return SourceErrorKind::Transient;
    }
    match status_code {
        Some(429) => SourceErrorKind::Transient,
        Some(403) if is_rate_limit_error(message) => SourceErrorKind::Transient,
        Some(code) if (500..600).contains(&code) => SourceErrorKind::Transient,
        Some(_) => SourceErrorKind::Permanent,
        None if is_network_error(message) => SourceErrorKind::Transient,
        None => SourceErrorKind::Permanent,
    }
}

fn is_transient_message(message: &str) -> bool {
    message.to_lowercase().contains("try again")
}

fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert_eq!(classify(Some(502), "bad gateway"), SourceErrorKind::Transient);
        assert_eq!(classify(Some(429), "slow down"), SourceErrorKind::Transient);
        assert_eq!(
            classify(Some(403), "API rate limit exceeded"),
            SourceErrorKind::Transient
        );
    }

    #[test]
    fn client_errors_are_permanent() {
        assert_eq!(classify(Some(404), "Not Found"), SourceErrorKind::Permanent);
        assert_eq!(classify(Some(403), "Resource not accessible"), SourceErrorKind::Permanent);
        assert_eq!(classify(Some(401), "Bad credentials"), SourceErrorKind::Permanent);
    }

    #[test]
    fn statusless_errors_depend_on_message() {
        assert_eq!(classify(None, "connection reset"), SourceErrorKind::Transient);
        assert_eq!(classify(None, "request timed out"), SourceErrorKind::Transient);
        assert_eq!(classify(None, "invalid release payload"), SourceErrorKind::Permanent);
        assert_eq!(classify(Some(400), "please try again"), SourceErrorKind::Transient);
    }

    #[test]
    fn display_includes_status() {
        let err = SourceError::from_status(503, "unavailable");
        assert_eq!(err.to_string(), "artifact source error (HTTP 503): unavailable");
        assert!(err.is_retriable());

        let err = SourceError::permanent("bad payload");
        assert_eq!(err.to_string(), "artifact source error: bad payload");
        assert!(!err.is_retriable());
    }
}
