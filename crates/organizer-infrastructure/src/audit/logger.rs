use flume::{bounded, Receiver, Sender};
use organizer_core::domain::AuditEntry;
use organizer_core::error::StorageError;
use organizer_core::repositories::{AuditSink, LocalStore};
use organizer_shared::constants::{AUDIT_LOG_CAPACITY, AUDIT_LOG_KEY};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Logger configuration
#[derive(Debug, Clone)]
pub struct AuditLoggerConfig {
    /// Entries buffered in memory before new ones are dropped
    pub queue_capacity: usize,

    /// Entries written per storage round trip
    pub batch_size: usize,

    /// Max wait before flushing a partial batch (milliseconds)
    pub batch_timeout_ms: u64,

    /// Entries kept in the stored log
    pub retained: usize,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_000,
            batch_size: 50,
            batch_timeout_ms: 500,
            retained: AUDIT_LOG_CAPACITY,
        }
    }
}

/// Audit sink that hands entries to a background task which appends them
/// to the capped log under `audit_log`.
#[derive(Clone)]
pub struct AuditLogger {
    sender: Sender<AuditEntry>,
}

impl AuditLogger {
    /// Spawns the writer task; must run inside a Tokio runtime.
    pub fn new(store: Arc<dyn LocalStore>, config: AuditLoggerConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);

        info!(
            "Initializing AuditLogger: queue={}, batch={}, timeout={}ms, retained={}",
            config.queue_capacity, config.batch_size, config.batch_timeout_ms, config.retained
        );

        tokio::spawn(async move {
            Self::worker_loop(store, receiver, config).await;
        });

        Self { sender }
    }

    async fn worker_loop(store: Arc<dyn LocalStore>, receiver: Receiver<AuditEntry>, config: AuditLoggerConfig) {
        let mut batch: Vec<AuditEntry> = Vec::with_capacity(config.batch_size);
        let batch_timeout = Duration::from_millis(config.batch_timeout_ms);

        loop {
            // Block for the first entry, then collect until the batch is
            // full or the deadline passes.
            match receiver.recv_async().await {
                Ok(entry) => batch.push(entry),
                Err(_) => {
                    debug!("Audit logger shutting down (channel closed)");
                    return;
                }
            }

            let deadline = tokio::time::Instant::now() + batch_timeout;
            let mut closed = false;
            while batch.len() < config.batch_size {
                match tokio::time::timeout_at(deadline, receiver.recv_async()).await {
                    Ok(Ok(entry)) => batch.push(entry),
                    Ok(Err(_)) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            if let Err(e) = flush_batch(store.as_ref(), &batch, config.retained).await {
                error!("Failed to write {} audit entries: {}", batch.len(), e);
            }
            batch.clear();

            if closed {
                debug!("Audit logger shutting down (channel closed)");
                return;
            }
        }
    }
}

impl AuditSink for AuditLogger {
    fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.sender.try_send(entry) {
            warn!("Failed to enqueue audit entry (queue full?): {}", e);
        }
    }
}

/// Append a batch to the stored log, keeping the newest `retained` entries.
async fn flush_batch(store: &dyn LocalStore, batch: &[AuditEntry], retained: usize) -> Result<(), StorageError> {
    let mut entries = read_audit_log(store).await;
    entries.extend_from_slice(batch);
    if entries.len() > retained {
        entries.drain(..entries.len() - retained);
    }
    store.set(AUDIT_LOG_KEY, &serde_json::to_string(&entries)?).await?;
    debug!("Flushed {} audit entries ({} retained)", batch.len(), entries.len());
    Ok(())
}

/// Stored audit entries, oldest first. A missing or unreadable log is empty.
pub async fn read_audit_log(store: &dyn LocalStore) -> Vec<AuditEntry> {
    match store.get(AUDIT_LOG_KEY).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable audit log: {}", e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Could not read audit log: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use organizer_core::domain::Severity;
    use organizer_core::repositories::MemoryLocalStore;
    use organizer_shared::new_id;
    use serde_json::json;

    fn entry(n: usize) -> AuditEntry {
        AuditEntry::new(new_id(), "menu.update", json!({ "n": n }), Severity::Low)
    }

    async fn wait_for_len(store: &dyn LocalStore, len: usize) -> Vec<AuditEntry> {
        for _ in 0..200 {
            let entries = read_audit_log(store).await;
            if entries.len() >= len {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        read_audit_log(store).await
    }

    #[tokio::test]
    async fn test_entries_are_persisted_in_order() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let logger = AuditLogger::new(store.clone(), AuditLoggerConfig { batch_timeout_ms: 20, ..Default::default() });

        for n in 0..3 {
            logger.record(entry(n));
        }
        let entries = wait_for_len(store.as_ref(), 3).await;
        let ns: Vec<_> = entries.iter().map(|e| e.details["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_log_is_capped() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let config = AuditLoggerConfig { batch_size: 7, batch_timeout_ms: 20, retained: 10, ..Default::default() };
        let logger = AuditLogger::new(store.clone(), config);

        for n in 0..25 {
            logger.record(entry(n));
        }
        for _ in 0..200 {
            let entries = read_audit_log(store.as_ref()).await;
            if entries.last().map(|e| e.details["n"] == json!(24)).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let entries = read_audit_log(store.as_ref()).await;
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].details["n"], json!(15));
        assert_eq!(entries[9].details["n"], json!(24));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let logger = AuditLogger::new(store, AuditLoggerConfig { queue_capacity: 1, ..Default::default() });
        for n in 0..100 {
            logger.record(entry(n));
        }
    }

    #[tokio::test]
    async fn test_corrupt_log_is_replaced() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        store.set(AUDIT_LOG_KEY, "{broken").await.unwrap();
        let logger = AuditLogger::new(store.clone(), AuditLoggerConfig { batch_timeout_ms: 20, ..Default::default() });
        logger.record(entry(7));

        let entries = wait_for_len(store.as_ref(), 1).await;
        assert_eq!(entries.len(), 1);
    }
}
