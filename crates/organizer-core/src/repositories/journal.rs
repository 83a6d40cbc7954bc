//! Offline action journal (port) and the snapshot implementation

use async_trait::async_trait;
use organizer_shared::constants::OFFLINE_ACTIONS_KEY_PREFIX;
use organizer_shared::utils::offline_actions_key;
use organizer_shared::{EntityId, Identity};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::LocalStore;
use crate::domain::{decode_actions, encode_actions, OfflineAction};
use crate::error::StorageError;

/// Durable per-identity action list. Implementations must keep insertion
/// order through restarts.
#[async_trait]
pub trait ActionJournal: Send + Sync {
    async fn load(&self, identity: &Identity) -> Result<Vec<OfflineAction>, StorageError>;
    async fn append(&self, action: &OfflineAction) -> Result<(), StorageError>;
    /// Returns whether an action was removed.
    async fn remove(&self, identity: &Identity, action_id: &EntityId) -> Result<bool, StorageError>;
    /// Identities that may have queued actions.
    async fn identities(&self) -> Result<Vec<Identity>, StorageError>;
}

/// One JSON array per identity under `offline_actions:{identity}`,
/// rewritten in full on every change.
pub struct SnapshotJournal<L: LocalStore> {
    store: Arc<L>,
}

impl<L: LocalStore> SnapshotJournal<L> {
    pub fn new(store: Arc<L>) -> Self {
        Self { store }
    }

    /// Current list, treating a corrupt array as empty so the next write
    /// replaces it.
    async fn load_for_write(&self, identity: &Identity) -> Result<Vec<OfflineAction>, StorageError> {
        match self.load(identity).await {
            Err(StorageError::Corrupt(reason)) => {
                warn!(identity = %identity, "Discarding corrupt offline queue: {}", reason);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn save(&self, identity: &Identity, actions: &[OfflineAction]) -> Result<(), StorageError> {
        let key = offline_actions_key(identity);
        if actions.is_empty() {
            return self.store.remove(&key).await;
        }
        self.store.set(&key, &encode_actions(actions)?).await
    }
}

#[async_trait]
impl<L: LocalStore> ActionJournal for SnapshotJournal<L> {
    async fn load(&self, identity: &Identity) -> Result<Vec<OfflineAction>, StorageError> {
        let raw = match self.store.get(&offline_actions_key(identity)).await {
            Ok(raw) => raw,
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::InvalidData => {
                return Err(StorageError::Corrupt(e.to_string()));
            }
            Err(e) => return Err(e),
        };
        match raw {
            Some(raw) => decode_actions(&raw).map_err(|e| StorageError::Corrupt(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn append(&self, action: &OfflineAction) -> Result<(), StorageError> {
        let mut actions = self.load_for_write(&action.identity).await?;
        actions.push(action.clone());
        self.save(&action.identity, &actions).await
    }

    async fn remove(&self, identity: &Identity, action_id: &EntityId) -> Result<bool, StorageError> {
        let mut actions = self.load_for_write(identity).await?;
        let before = actions.len();
        actions.retain(|a| a.id != *action_id);
        if actions.len() == before {
            return Ok(false);
        }
        self.save(identity, &actions).await?;
        Ok(true)
    }

    async fn identities(&self) -> Result<Vec<Identity>, StorageError> {
        let keys = self.store.keys_with_prefix(OFFLINE_ACTIONS_KEY_PREFIX).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(OFFLINE_ACTIONS_KEY_PREFIX))
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MenuMutation;
    use crate::repositories::MemoryLocalStore;
    use organizer_shared::new_id;

    fn journal() -> (Arc<MemoryLocalStore>, SnapshotJournal<MemoryLocalStore>) {
        let store = Arc::new(MemoryLocalStore::new());
        (store.clone(), SnapshotJournal::new(store))
    }

    fn action(identity: Identity) -> OfflineAction {
        OfflineAction::new(identity, &MenuMutation::Delete { menu_id: new_id() }).unwrap()
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let (_, journal) = journal();
        let identity = new_id();
        let first = action(identity);
        let second = action(identity);
        journal.append(&first).await.unwrap();
        journal.append(&second).await.unwrap();

        let ids: Vec<_> = journal.load(&identity).await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(journal.identities().await.unwrap(), vec![identity]);
    }

    #[tokio::test]
    async fn test_removing_last_action_drops_the_key() {
        let (store, journal) = journal();
        let identity = new_id();
        let a = action(identity);
        journal.append(&a).await.unwrap();
        assert!(journal.remove(&identity, &a.id).await.unwrap());
        assert!(!journal.remove(&identity, &a.id).await.unwrap());
        assert!(store.get(&offline_actions_key(&identity)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_array_is_replaced_on_append() {
        let (store, journal) = journal();
        let identity = new_id();
        store.set(&offline_actions_key(&identity), "[{\"id\": tru").await.unwrap();
        assert!(matches!(journal.load(&identity).await, Err(StorageError::Corrupt(_))));

        let a = action(identity);
        journal.append(&a).await.unwrap();
        assert_eq!(journal.load(&identity).await.unwrap(), vec![a]);
    }

    /// Store whose reads fail the way a file cut mid-character does.
    struct UnreadableStore;

    #[async_trait]
    impl LocalStore for UnreadableStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::new(ErrorKind::InvalidData, "stream did not contain valid UTF-8").into())
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_treated_as_corrupt() {
        let journal = SnapshotJournal::new(Arc::new(UnreadableStore));
        let identity = new_id();
        assert!(matches!(journal.load(&identity).await, Err(StorageError::Corrupt(_))));

        journal.append(&action(identity)).await.unwrap();
        assert!(!journal.remove(&identity, &new_id()).await.unwrap());
    }
}
