//! Audit trail entries

use chrono::{DateTime, Utc};
use organizer_shared::Identity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub identity: Identity,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
    pub severity: Severity,
}

impl AuditEntry {
    pub fn new(identity: Identity, action: impl Into<String>, details: Value, severity: Severity) -> Self {
        Self {
            identity,
            action: action.into(),
            timestamp: Utc::now(),
            details,
            severity,
        }
    }
}
