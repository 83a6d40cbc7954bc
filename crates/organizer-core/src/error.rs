//! Domain errors

use chrono::{DateTime, Utc};
use organizer_security::ValidationIssue;
use thiserror::Error;

use crate::domain::DenyReason;

/// Failures talking to the backing menu store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store request timed out")]
    Timeout,

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Record not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Transport failures, timeouts, 5xx, 429 and "service unavailable"
    /// style messages are worth another attempt. Everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, message } => {
                *status >= 500 || *status == 429 || has_transient_signature(message)
            }
            Self::Conflict(message) | Self::Decode(message) => has_transient_signature(message),
            Self::NotFound => false,
        }
    }

    /// Failures that mean the store is unreachable rather than unhappy.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

fn has_transient_signature(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("timeout") || lowered.contains("timed out") || lowered.contains("service unavailable")
}

/// Local persistence failures (offline queue, audit log).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt storage: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("Validation failed: {}", summarize(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    #[error("Not authorized: {reason}")]
    Unauthorized { reason: DenyReason },

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Menu limit of {limit} reached")]
    LimitReached { limit: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Offline queue error: {0}")]
    Queue(#[from] StorageError),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl MutationError {
    /// Short machine-readable label used in audit records and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid",
            Self::Unauthorized { .. } => "denied",
            Self::RateLimited { .. } => "rate_limited",
            Self::LimitReached { .. } => "limit_reached",
            Self::Store(_) => "failed",
            Self::Queue(_) => "queue_failed",
        }
    }
}
