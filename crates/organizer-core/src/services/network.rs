// ============================================================================
// Organizer Core - Network State
// File: crates/organizer-core/src/services/network.rs
// ============================================================================
//! Process-wide connectivity state with a subscribable current value.
//!
//! `is_online` follows transport reachability (the probe), `is_connected`
//! follows observed store call outcomes (the retry executor).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::repositories::ConnectivityProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub is_online: bool,
    pub is_connected: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl NetworkSnapshot {
    /// Mutations go to the store only in this state.
    pub fn is_usable(&self) -> bool {
        self.is_online && self.is_connected
    }
}

pub struct NetworkState {
    tx: watch::Sender<NetworkSnapshot>,
}

impl NetworkState {
    /// Starts online and connected; the probe corrects it within one interval.
    pub fn new() -> Self {
        Self::with_snapshot(NetworkSnapshot {
            is_online: true,
            is_connected: true,
            last_connected_at: Some(Utc::now()),
        })
    }

    pub fn offline() -> Self {
        Self::with_snapshot(NetworkSnapshot {
            is_online: false,
            is_connected: false,
            last_connected_at: None,
        })
    }

    fn with_snapshot(snapshot: NetworkSnapshot) -> Self {
        let (tx, _) = watch::channel(snapshot);
        Self { tx }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        *self.tx.borrow()
    }

    pub fn is_usable(&self) -> bool {
        self.snapshot().is_usable()
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|s| {
            let changed = s.is_online != online;
            s.is_online = online;
            changed
        });
        if changed {
            info!(online, "Network reachability changed");
        }
    }

    pub fn mark_connected(&self) {
        let now = Utc::now();
        let changed = self.tx.send_if_modified(|s| {
            let changed = !s.is_connected;
            s.is_connected = true;
            s.last_connected_at = Some(now);
            changed
        });
        if changed {
            info!("Store connection restored");
        }
    }

    pub fn mark_disconnected(&self) {
        let changed = self.tx.send_if_modified(|s| {
            let changed = s.is_connected;
            s.is_connected = false;
            changed
        });
        if changed {
            warn!("Store connection lost");
        }
    }

    /// Receivers are woken only when a flag flips.
    pub fn subscribe(&self) -> watch::Receiver<NetworkSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Ping the store every `interval` and fold the result into `network`.
pub fn spawn_probe_loop(
    probe: Arc<dyn ConnectivityProbe>,
    network: Arc<NetworkState>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match probe.ping().await {
                Ok(()) => {
                    network.set_online(true);
                    network.mark_connected();
                }
                Err(e) if e.is_transport() => {
                    debug!("Connectivity probe unreachable: {}", e);
                    network.set_online(false);
                    network.mark_disconnected();
                }
                Err(e) => {
                    debug!("Connectivity probe failed: {}", e);
                    network.set_online(true);
                    network.mark_disconnected();
                }
            }
        }
    })
}
