// ============================================================================
// Organizer Infrastructure - REST Menu Store
// File: crates/organizer-infrastructure/src/rest/menu_store.rs
// Description: MenuStore over a PostgREST-style HTTP API
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use organizer_core::domain::{MemberRole, Membership, Menu, MenuPatch};
use organizer_core::error::StoreError;
use organizer_core::repositories::{ConnectivityProbe, MenuStore};
use organizer_shared::config::StoreSettings;
use organizer_shared::utils::truncate_for_log;
use organizer_shared::{EntityId, Identity, MenuType};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const MENUS: &str = "menus";
const MEMBERS: &str = "menu_members";

pub struct RestMenuStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestMenuStore {
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str, filter: &str) -> String {
        if filter.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, filter)
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorized(builder).send().await.map_err(map_transport)?;
        check_status(response).await
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = self.send(builder).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Write that asks the store to echo the affected rows.
    async fn write(&self, builder: RequestBuilder) -> Result<Vec<MenuRow>, StoreError> {
        self.fetch(builder.header("Prefer", "return=representation")).await
    }

    async fn select_menus(&self, filter: &str) -> Result<Vec<Menu>, StoreError> {
        let url = self.table_url(MENUS, filter);
        debug!(url = %url, "Selecting menus");
        let rows: Vec<MenuRow> = self.fetch(self.client.get(&url)).await?;
        Ok(rows.into_iter().map(Menu::from).collect())
    }

    async fn select_members(&self, filter: &str) -> Result<Vec<Membership>, StoreError> {
        let url = self.table_url(MEMBERS, filter);
        let rows: Vec<MemberRow> = self.fetch(self.client.get(&url)).await?;
        Ok(rows.into_iter().map(Membership::from).collect())
    }
}

fn map_transport(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %truncate_for_log(&body, 200), "Store request failed");
    Err(match status.as_u16() {
        404 => StoreError::NotFound,
        409 => StoreError::Conflict(body),
        code => StoreError::Status { status: code, message: body },
    })
}

#[async_trait]
impl MenuStore for RestMenuStore {
    async fn find_menu(&self, id: &EntityId) -> Result<Option<Menu>, StoreError> {
        let menus = self.select_menus(&format!("id=eq.{}&select=*", id)).await?;
        Ok(menus.into_iter().next())
    }

    async fn find_membership(&self, menu_id: &EntityId, member_id: &Identity) -> Result<Option<Membership>, StoreError> {
        let members = self
            .select_members(&format!("menu_id=eq.{}&member_id=eq.{}&select=*", menu_id, member_id))
            .await?;
        Ok(members.into_iter().next())
    }

    async fn list_owned(&self, owner_id: &Identity) -> Result<Vec<Menu>, StoreError> {
        self.select_menus(&format!("owner_id=eq.{}&select=*&order=order.asc", owner_id))
            .await
    }

    async fn list_memberships(&self, member_id: &Identity) -> Result<Vec<Membership>, StoreError> {
        self.select_members(&format!("member_id=eq.{}&select=*", member_id)).await
    }

    async fn list_menus_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Menu>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        self.select_menus(&format!("id=in.({})&select=*&order=order.asc", list)).await
    }

    async fn list_public_groups(&self) -> Result<Vec<Menu>, StoreError> {
        self.select_menus("type=eq.group&is_private=eq.false&select=*&order=order.asc")
            .await
    }

    async fn insert_menu(&self, menu: &Menu) -> Result<Menu, StoreError> {
        let url = self.table_url(MENUS, "");
        let rows = self.write(self.client.post(&url).json(menu)).await?;
        rows.into_iter()
            .next()
            .map(Menu::from)
            .ok_or_else(|| StoreError::Decode("insert returned no row".into()))
    }

    async fn update_menu(&self, id: &EntityId, patch: &MenuPatch) -> Result<Menu, StoreError> {
        let url = self.table_url(MENUS, &format!("id=eq.{}", id));
        let mut body = serde_json::to_value(patch).map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Value::Object(fields) = &mut body {
            fields.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
        }

        let rows = self.write(self.client.patch(&url).json(&body)).await?;
        rows.into_iter().next().map(Menu::from).ok_or(StoreError::NotFound)
    }

    async fn delete_menu(&self, id: &EntityId) -> Result<(), StoreError> {
        let url = self.table_url(MENUS, &format!("id=eq.{}", id));
        let rows = self.write(self.client.delete(&url)).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectivityProbe for RestMenuStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/", self.base_url);
        self.send(self.client.get(&url)).await.map(|_| ())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MenuRow {
    id: EntityId,
    owner_id: Identity,
    name: String,
    #[serde(rename = "type")]
    menu_type: MenuType,
    config: Option<Value>,
    order: Option<i32>,
    is_private: Option<bool>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<MenuRow> for Menu {
    fn from(row: MenuRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            menu_type: row.menu_type,
            config: row.config.unwrap_or(Value::Object(Default::default())),
            order: row.order.unwrap_or(0),
            is_private: row.is_private.unwrap_or(false),
            created_at: row.created_at,
            updated_at: row.updated_at.unwrap_or(row.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    menu_id: EntityId,
    member_id: Identity,
    role: MemberRole,
    joined_at: DateTime<Utc>,
}

impl From<MemberRow> for Membership {
    fn from(row: MemberRow) -> Self {
        Self {
            menu_id: row.menu_id,
            member_id: row.member_id,
            role: row.role,
            joined_at: row.joined_at,
        }
    }
}
