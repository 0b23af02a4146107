use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by an external assessment source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("source unavailable: {message}")]
    Unavailable { message: String },
    #[error("source timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("source rejected input: {reason}")]
    Rejected { reason: String },
    #[error("malformed source data: {reason}")]
    Malformed { reason: String, raw: String },
}

impl SourceError {
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn malformed<S: Into<String>, R: Into<String>>(reason: S, raw: R) -> Self {
        Self::Malformed {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Unavailable { .. } => FailureKind::SourceUnavailable,
            SourceError::Timeout { .. } => FailureKind::SourceTimeout,
            SourceError::Rejected { .. } => FailureKind::SourceRejected,
            SourceError::Malformed { .. } => FailureKind::MalformedSourceData,
        }
    }

    /// Transport failures and timeouts are worth another attempt; explicit
    /// rejections and bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Unavailable { .. } | SourceError::Timeout { .. } => true,
            SourceError::Rejected { .. } | SourceError::Malformed { .. } => false,
        }
    }

    /// Raw provider payload kept for diagnostics, if any.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            SourceError::Malformed { raw, .. } => Some(raw.as_str()),
            _ => None,
        }
    }
}

/// Copyable classification of a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceUnavailable,
    SourceTimeout,
    SourceRejected,
    MalformedSourceData,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SourceUnavailable => "source_unavailable",
            FailureKind::SourceTimeout => "source_timeout",
            FailureKind::SourceRejected => "source_rejected",
            FailureKind::MalformedSourceData => "malformed_source_data",
        }
    }
}

/// Invariant breaches on a practice session. Never recovered locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session ordering violation: expected sequence {expected}, got {actual}")]
    OrderingViolation { expected: u64, actual: u64 },
    #[error("assessment result {sequence} is already finalized")]
    ResultAlreadyFinalized { sequence: u64 },
    #[error("session {session_id} was abandoned")]
    Abandoned { session_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_kind() {
        assert!(SourceError::unavailable("reset").is_retryable());
        assert!(SourceError::Timeout {
            elapsed: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(!SourceError::rejected("unsupported codec").is_retryable());
        assert!(!SourceError::malformed("bad json", "{").is_retryable());
    }

    #[test]
    fn malformed_keeps_raw_payload() {
        let error = SourceError::malformed("missing scores", "{\"grade\": 3}");
        assert_eq!(error.kind(), FailureKind::MalformedSourceData);
        assert_eq!(error.raw_payload(), Some("{\"grade\": 3}"));
        assert_eq!(SourceError::rejected("x").raw_payload(), None);
    }
}
