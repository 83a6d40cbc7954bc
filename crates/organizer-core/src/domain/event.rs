//! Real-time change events delivered by the store

use organizer_shared::{EntityId, Identity};
use serde::{Deserialize, Serialize};

use super::Menu;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

/// Old row image. Deletes usually carry only the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRef {
    pub id: EntityId,
    #[serde(default)]
    pub owner_id: Option<Identity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    #[serde(default)]
    pub new: Option<Menu>,
    #[serde(default)]
    pub old: Option<MenuRef>,
}

impl ChangeEvent {
    pub fn inserted(menu: Menu) -> Self {
        Self { event_type: ChangeEventType::Insert, new: Some(menu), old: None }
    }

    pub fn updated(menu: Menu) -> Self {
        let old = MenuRef { id: menu.id, owner_id: Some(menu.owner_id) };
        Self { event_type: ChangeEventType::Update, new: Some(menu), old: Some(old) }
    }

    pub fn deleted(id: EntityId, owner_id: Option<Identity>) -> Self {
        Self { event_type: ChangeEventType::Delete, new: None, old: Some(MenuRef { id, owner_id }) }
    }

    pub fn menu_id(&self) -> Option<EntityId> {
        self.new.as_ref().map(|m| m.id).or_else(|| self.old.as_ref().map(|o| o.id))
    }

    pub fn owner_id(&self) -> Option<Identity> {
        self.new
            .as_ref()
            .map(|m| m.owner_id)
            .or_else(|| self.old.as_ref().and_then(|o| o.owner_id))
    }

    /// Events without a known owner are delivered to everyone; merging
    /// them is a no-op for views that never held the row.
    pub fn concerns(&self, owner: &Identity) -> bool {
        self.owner_id().map_or(true, |o| o == *owner)
    }
}
