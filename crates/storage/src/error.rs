//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::time::Duration;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Path does not exist. Usually expected rather than exceptional.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Destination already exists. Mutating calls treat this as success.
    #[display("already exists: {_0}")]
    AlreadyExists(#[error(not(source))] String),
    /// Network hiccup or server-side failure; retrying might succeed.
    #[display("transient remote failure: {_0}")]
    Transient(#[error(not(source))] String),
    /// The remote asked us to slow down.
    #[display("rate limited (retry after {_0:?}s)")]
    RateLimited(#[error(not(source))] Option<u64>),
    /// A single remote call exceeded its time budget.
    #[display("remote call timed out")]
    Timeout,
    /// Credentials were rejected. Nothing will work until a human intervenes.
    #[display("unauthorized: {_0}")]
    Unauthorized(#[error(not(source))] String),
    /// Credentials could not be loaded at all.
    #[display("credentials unavailable: {_0}")]
    Credentials(#[error(not(source))] String),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited(_) | Self::Timeout | Self::Io(_))
    }

    /// Returns `true` if no further remote work can succeed with the current
    /// credentials.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Credentials(_))
    }

    /// Minimum delay requested by the remote before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(Some(secs)) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Transient("503".to_string()), true)]
    #[case(ErrorKind::RateLimited(None), true)]
    #[case(ErrorKind::Timeout, true)]
    #[case(ErrorKind::NotFound("/a".to_string()), false)]
    #[case(ErrorKind::AlreadyExists("/a".to_string()), false)]
    #[case(ErrorKind::Unauthorized("expired".to_string()), false)]
    #[case(ErrorKind::Backend("weird".to_string()), false)]
    fn test_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn test_fatal() {
        assert!(ErrorKind::Unauthorized("nope".to_string()).is_fatal());
        assert!(ErrorKind::Credentials("missing".to_string()).is_fatal());
        assert!(!ErrorKind::Timeout.is_fatal());
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(ErrorKind::RateLimited(Some(3)).retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(ErrorKind::RateLimited(None).retry_after(), None);
        assert_eq!(ErrorKind::Timeout.retry_after(), None);
    }
}
