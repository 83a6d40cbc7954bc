//! Menu entity

use chrono::{DateTime, Utc};
use organizer_shared::{EntityId, Identity, MenuType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// A user-defined menu page. Names are unique per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub id: EntityId,
    pub owner_id: Identity,
    pub name: String,
    #[serde(rename = "type")]
    pub menu_type: MenuType,
    #[serde(default)]
    pub config: Value,
    pub order: i32,
    #[serde(default)]
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Menu {
    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner_id == *identity
    }
}

/// Input for creating a menu.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMenu {
    pub name: String,
    #[serde(rename = "type")]
    pub menu_type: MenuType,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub is_private: bool,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct MenuPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub order: Option<i32>,
}

impl MenuPatch {
    pub fn order_only(order: i32) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.config.is_none() && self.is_private.is_none() && self.order.is_none()
    }

    /// Whether the patch touches user-authored content.
    pub fn touches_content(&self) -> bool {
        self.name.is_some() || self.config.is_some()
    }

    pub fn apply_to(&self, menu: &mut Menu, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            menu.name = name.clone();
        }
        if let Some(config) = &self.config {
            menu.config = config.clone();
        }
        if let Some(is_private) = self.is_private {
            menu.is_private = is_private;
        }
        if let Some(order) = self.order {
            menu.order = order;
        }
        menu.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MenuOrder {
    pub menu_id: EntityId,
    #[validate(range(min = 0))]
    pub order: i32,
}
