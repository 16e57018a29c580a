use std::fmt;

/// Text shown when the backend no longer knows a job. Jobs live in backend
/// memory, so a restart drops them.
pub const JOB_NOT_FOUND_MESSAGE: &str =
    "Job not found. It may have been cleared after a backend restart.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Unauthorized,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    InvalidUrl,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed payload"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
        }
    }
}

/// A backend call failure, normalized to one kind and one message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(FailureKind::NotFound, JOB_NOT_FOUND_MESSAGE)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FailureKind::NotFound
    }

    /// Failures that are expected to clear up on the next attempt.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Network | FailureKind::Decode => true,
            FailureKind::HttpStatus(code) => code == 408 || code == 429 || code >= 500,
            FailureKind::NotFound | FailureKind::Unauthorized | FailureKind::InvalidUrl => false,
        }
    }
}
