// ============================================================================
// Organizer Core - Reconciler
// File: crates/organizer-core/src/services/reconciler.rs
// ============================================================================
//! Drains offline queues when connectivity returns and folds the real-time
//! change stream into local views.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use organizer_shared::config::QueueSettings;
use organizer_shared::constants::DEFAULT_STALENESS_HOURS;
use organizer_shared::Identity;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::gateway::MutationGateway;
use crate::domain::ChangeEvent;
use crate::error::StoreError;
use crate::repositories::{ChangeFeed, MenuStore};

#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Failing actions older than this are dropped.
    pub staleness: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::hours(DEFAULT_STALENESS_HOURS),
        }
    }
}

impl From<&QueueSettings> for ReconcilerConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            staleness: Duration::hours(settings.staleness_hours),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub processed: usize,
    pub failed: usize,
    pub dropped: usize,
}

impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.dropped += other.dropped;
    }
}

pub struct Reconciler<S: MenuStore> {
    gateway: Arc<MutationGateway<S>>,
    config: ReconcilerConfig,
    in_flight: DashMap<Identity, ()>,
}

/// Clears the in-flight marker for an identity when a drain ends.
struct DrainGuard<'a> {
    in_flight: &'a DashMap<Identity, ()>,
    identity: Identity,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.identity);
    }
}

impl<S: MenuStore + 'static> Reconciler<S> {
    pub fn new(gateway: Arc<MutationGateway<S>>, config: ReconcilerConfig) -> Self {
        Self {
            gateway,
            config,
            in_flight: DashMap::new(),
        }
    }

    /// Replay every queued action of `identity` in enqueue order. Replays
    /// are started in order but run concurrently; completion order is not
    /// guaranteed. A failed action stays queued unless it is stale.
    pub async fn sync_offline_actions(&self, identity: &Identity) -> SyncReport {
        if self.in_flight.insert(*identity, ()).is_some() {
            debug!(identity = %identity, "Drain already running");
            return SyncReport::default();
        }
        let _guard = DrainGuard {
            in_flight: &self.in_flight,
            identity: *identity,
        };

        let queue = self.gateway.queue();
        let actions = queue.list(identity).await;
        if actions.is_empty() {
            return SyncReport::default();
        }

        info!(identity = %identity, pending = actions.len(), "Replaying offline actions");
        let results = join_all(actions.iter().map(|action| self.gateway.replay(action))).await;

        let now = Utc::now();
        let metrics = self.gateway.metrics();
        let mut report = SyncReport::default();
        for (action, result) in actions.iter().zip(results) {
            let outcome = match result {
                Ok(()) => {
                    report.processed += 1;
                    "processed"
                }
                Err(e) if action.age(now) > self.config.staleness => {
                    warn!(
                        identity = %identity,
                        action_id = %action.id,
                        kind = %action.kind,
                        enqueued_at = %action.enqueued_at,
                        "Dropping stale offline action: {}",
                        e
                    );
                    report.dropped += 1;
                    "dropped"
                }
                Err(e) => {
                    warn!(identity = %identity, action_id = %action.id, kind = %action.kind, "Replay failed, keeping action: {}", e);
                    report.failed += 1;
                    metrics.record_replay("failed");
                    continue;
                }
            };

            metrics.record_replay(outcome);
            if let Err(e) = queue.remove(identity, &action.id).await {
                error!(identity = %identity, action_id = %action.id, "Could not remove replayed action: {}", e);
            }
        }

        info!(
            identity = %identity,
            processed = report.processed,
            failed = report.failed,
            dropped = report.dropped,
            "Offline sync finished"
        );
        report
    }

    /// Drain every identity that has pending actions.
    pub async fn sync_all(&self) -> SyncReport {
        let mut total = SyncReport::default();
        for identity in self.gateway.queue().pending_identities().await {
            total.merge(self.sync_offline_actions(&identity).await);
        }
        total
    }

    /// Merge the change stream for `identity` into its view until the feed
    /// closes.
    pub async fn follow(&self, identity: Identity, feed: &dyn ChangeFeed) -> Result<JoinHandle<()>, StoreError> {
        let mut rx = feed.subscribe(&identity).await?;
        let view = self.gateway.views().view_for(&identity);

        Ok(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                view.apply_event(&event);
            }
            debug!(identity = %identity, "Change stream closed");
        }))
    }

    /// Route every event of a shared stream to the views that may hold the
    /// row: the owner's view, or all views when the owner is unknown.
    /// Identities without a view are skipped; they load fresh on first read.
    pub fn merge_changes(&self, mut rx: broadcast::Receiver<ChangeEvent>) -> JoinHandle<()> {
        let views = self.gateway.views().clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match event.owner_id() {
                        Some(owner) => {
                            if let Some(view) = views.get(&owner) {
                                view.apply_event(&event);
                            }
                        }
                        None => {
                            for view in views.all() {
                                view.apply_event(&event);
                            }
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change merge lagged, views may be stale until next read");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Shared change stream closed");
        })
    }

    /// Drain all queues each time the network becomes usable, and once at
    /// start if it already is.
    pub fn watch_connectivity(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.gateway.network().subscribe();

        tokio::spawn(async move {
            let mut was_usable = rx.borrow_and_update().is_usable();
            if was_usable {
                self.sync_all().await;
            }

            while rx.changed().await.is_ok() {
                let usable = rx.borrow_and_update().is_usable();
                if usable && !was_usable {
                    info!("Connectivity restored, draining offline queues");
                    let report = self.sync_all().await;
                    debug!(?report, "Reconnect drain finished");
                }
                was_usable = usable;
            }
        })
    }
}
