//! Request and response bodies

use organizer_core::domain::{MenuOrder, MenuPatch, NewMenu, OfflineAction};
use organizer_shared::MenuType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub menu_type: MenuType,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub is_private: bool,
    pub order: Option<i32>,
}

impl From<CreateMenuRequest> for NewMenu {
    fn from(req: CreateMenuRequest) -> Self {
        Self {
            name: req.name,
            menu_type: req.menu_type,
            config: req.config,
            is_private: req.is_private,
            order: req.order,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuRequest {
    pub name: Option<String>,
    pub config: Option<Value>,
    pub is_private: Option<bool>,
    pub order: Option<i32>,
}

impl From<UpdateMenuRequest> for MenuPatch {
    fn from(req: UpdateMenuRequest) -> Self {
        Self {
            name: req.name,
            config: req.config,
            is_private: req.is_private,
            order: req.order,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub orders: Vec<MenuOrder>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub has_pending: bool,
    pub count: usize,
    pub actions: Vec<OfflineAction>,
}
