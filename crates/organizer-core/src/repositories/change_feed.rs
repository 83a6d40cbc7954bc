//! Real-time change stream port and an in-process fan-out hub

use async_trait::async_trait;
use organizer_shared::Identity;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::domain::ChangeEvent;
use crate::error::StoreError;

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Events for menus owned by `owner`, in the order the store applied them.
    async fn subscribe(&self, owner: &Identity) -> Result<mpsc::UnboundedReceiver<ChangeEvent>, StoreError>;
}

/// Broadcasts every change and hands out per-owner filtered receivers.
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Change event dropped (no subscribers): {}", e);
        }
    }

    /// Every event, unfiltered.
    pub fn subscribe_all(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Spawns a forwarding task, so this must run inside a Tokio runtime.
    pub fn subscribe_owner(&self, owner: Identity) -> mpsc::UnboundedReceiver<ChangeEvent> {
        let mut rx = self.tx.subscribe();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.concerns(&owner) && out_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(owner = %owner, skipped, "Change subscriber lagged, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        out_rx
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ChangeFeed for ChangeHub {
    async fn subscribe(&self, owner: &Identity) -> Result<mpsc::UnboundedReceiver<ChangeEvent>, StoreError> {
        Ok(self.subscribe_owner(*owner))
    }
}
