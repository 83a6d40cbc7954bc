// ============================================================================
// Organizer Infrastructure - Postgres Change Listener
// File: crates/organizer-infrastructure/src/realtime/listener.rs
// Description: LISTEN/NOTIFY bridge into the in-process change hub
// ============================================================================

use anyhow::Result;
use futures::StreamExt;
use organizer_core::domain::ChangeEvent;
use organizer_core::repositories::ChangeHub;
use organizer_shared::config::RealtimeSettings;
use organizer_shared::utils::truncate_for_log;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_postgres::AsyncMessage;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Listens on a notification channel whose payloads are JSON change events
/// and republishes them to every subscriber of the hub.
pub struct PgChangeListener {
    database_url: String,
    channel: String,
    hub: Arc<ChangeHub>,
}

impl PgChangeListener {
    pub fn new(settings: &RealtimeSettings, hub: Arc<ChangeHub>) -> Self {
        Self {
            database_url: settings.database_url.clone(),
            channel: settings.channel.clone(),
            hub,
        }
    }

    /// Run the listener in the background, reconnecting after failures.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.listen_once().await {
                    error!(channel = %self.channel, "Change listener failed: {}", e);
                }
                warn!("Change listener disconnected, reconnecting in {:?}", RECONNECT_DELAY);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }

    async fn listen_once(&self) -> Result<()> {
        info!("🔄 Connecting change listener...");
        let (client, mut connection) = tokio_postgres::connect(&self.database_url, tokio_postgres::NoTls).await?;

        // The connection must be polled for LISTEN to complete, so drive it
        // from its own task and forward notifications.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(async move {
            let mut stream = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
            while let Some(message) = stream.next().await {
                match message {
                    Ok(AsyncMessage::Notification(notification)) => {
                        if tx.send(notification.payload().to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => debug!("Received notice: {:?}", notice),
                    Ok(_) => {}
                    Err(e) => {
                        error!("Listener connection error: {}", e);
                        break;
                    }
                }
            }
        });

        client.batch_execute(&format!("LISTEN {}", self.channel)).await?;
        info!("✅ Listening for menu changes on channel: {}", self.channel);

        while let Some(payload) = rx.recv().await {
            if let Some(event) = parse_notification(&payload) {
                self.hub.publish(event);
            }
        }

        driver.abort();
        Ok(())
    }
}

/// Decode one notification payload. Malformed payloads are logged and
/// skipped.
pub fn parse_notification(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str::<ChangeEvent>(payload) {
        Ok(event) => {
            debug!(event_type = ?event.event_type, menu_id = ?event.menu_id(), "Change notification received");
            Some(event)
        }
        Err(e) => {
            warn!(payload = %truncate_for_log(payload, 120), "Failed to parse change notification: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use organizer_core::domain::ChangeEventType;
    use organizer_shared::new_id;
    use serde_json::json;

    #[test]
    fn test_parse_update_notification() {
        let id = new_id();
        let owner = new_id();
        let payload = json!({
            "eventType": "UPDATE",
            "new": {
                "id": id,
                "owner_id": owner,
                "name": "Raids",
                "type": "dashboard",
                "config": {},
                "order": 2,
                "is_private": false,
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-02T00:00:00Z"
            }
        })
        .to_string();

        let event = parse_notification(&payload).unwrap();
        assert_eq!(event.event_type, ChangeEventType::Update);
        assert_eq!(event.menu_id(), Some(id));
        assert_eq!(event.owner_id(), Some(owner));
    }

    #[test]
    fn test_parse_delete_notification() {
        let id = new_id();
        let payload = json!({ "eventType": "DELETE", "old": { "id": id } }).to_string();
        let event = parse_notification(&payload).unwrap();
        assert_eq!(event.menu_id(), Some(id));
        assert_eq!(event.owner_id(), None);
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        assert!(parse_notification("{\"eventType\": \"TRUNCATE\"}").is_none());
        assert!(parse_notification("not json").is_none());
    }
}
