//! Durable per-identity queue of mutations waiting for connectivity

use organizer_shared::{EntityId, Identity};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::OfflineAction;
use crate::error::StorageError;
use crate::repositories::ActionJournal;

pub struct OfflineQueue {
    journal: Arc<dyn ActionJournal>,
    // Journal writes are read-modify-write; one writer at a time.
    write_lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(journal: Arc<dyn ActionJournal>) -> Self {
        Self {
            journal,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn enqueue(&self, action: OfflineAction) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.journal.append(&action).await?;
        debug!(identity = %action.identity, action_id = %action.id, kind = %action.kind, "Action queued");
        Ok(())
    }

    /// Pending actions in insertion order. Unreadable storage yields an
    /// empty list.
    pub async fn list(&self, identity: &Identity) -> Vec<OfflineAction> {
        match self.journal.load(identity).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(identity = %identity, "Offline queue unreadable, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn remove(&self, identity: &Identity, action_id: &EntityId) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        self.journal.remove(identity, action_id).await
    }

    pub async fn has(&self, identity: &Identity) -> bool {
        !self.list(identity).await.is_empty()
    }

    pub async fn len(&self, identity: &Identity) -> usize {
        self.list(identity).await.len()
    }

    /// Identities with at least one pending action.
    pub async fn pending_identities(&self) -> Vec<Identity> {
        let identities = match self.journal.identities().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not enumerate offline queues: {}", e);
                return Vec::new();
            }
        };

        let mut pending = Vec::new();
        for identity in identities {
            if self.has(&identity).await {
                pending.push(identity);
            }
        }
        pending
    }
}
