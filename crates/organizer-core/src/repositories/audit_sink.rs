//! Audit sink (port)

use parking_lot::Mutex;

use crate::domain::AuditEntry;

/// Receives audit entries. `record` must not block and must not fail the
/// caller; sinks that do I/O hand entries off to a background task.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Keeps every entry in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}
