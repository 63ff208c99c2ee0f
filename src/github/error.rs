//! Conversion of HTTP client errors into [`SourceError`].
//!
//! Both octocrab (asset listing) and reqwest (text downloads) report failures
//! their own way; everything past this module only sees a classified
//! [`SourceError`].

use crate::source::{SourceError, classify};

impl SourceError {
    /// Categorizes an octocrab error.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = octocrab_status(&err);
        let message = err.to_string();
        Self {
            kind: classify(status_code, &message),
            status_code,
            message,
            source: Some(Box::new(err)),
        }
    }

    /// Categorizes a reqwest error. Timeouts and connect failures are always
    /// transient.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let message = err.to_string();
        let kind = if err.is_timeout() || err.is_connect() {
            crate::source::SourceErrorKind::Transient
        } else {
            classify(status_code, &message)
        };
        Self {
            kind,
            status_code,
            message,
            source: Some(Box::new(err)),
        }
    }
}

/// Extracts the HTTP status code from an octocrab error, if present.
///
/// Only API errors carry a structured status. Other variants fall back to
/// scanning the rendered message, which is fragile but degrades to `None`.
fn octocrab_status(err: &octocrab::Error) -> Option<u16> {
    if let octocrab::Error::GitHub { source, .. } = err {
        return Some(source.status_code.as_u16());
    }
    status_from_message(&err.to_string())
}

fn status_from_message(message: &str) -> Option<u16> {
    let idx = message.find("status: ")?;
    let digits: String = message[idx + 8..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_read_from_message() {
        assert_eq!(status_from_message("request failed, status: 502 Bad Gateway"), Some(502));
        assert_eq!(status_from_message("status: 404"), Some(404));
        assert_eq!(status_from_message("no code here"), None);
        assert_eq!(status_from_message("status: unknown"), None);
    }
}
