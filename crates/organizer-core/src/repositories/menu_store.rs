//! Menu store trait (port)

use async_trait::async_trait;
use organizer_shared::{EntityId, Identity};

use crate::domain::{Membership, Menu, MenuPatch};
use crate::error::StoreError;

/// Remote relational store holding menus and memberships.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn find_menu(&self, id: &EntityId) -> Result<Option<Menu>, StoreError>;
    async fn find_membership(&self, menu_id: &EntityId, member_id: &Identity) -> Result<Option<Membership>, StoreError>;
    async fn list_owned(&self, owner_id: &Identity) -> Result<Vec<Menu>, StoreError>;
    async fn list_memberships(&self, member_id: &Identity) -> Result<Vec<Membership>, StoreError>;
    async fn list_menus_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Menu>, StoreError>;
    /// Group menus not marked private, readable by any identity.
    async fn list_public_groups(&self) -> Result<Vec<Menu>, StoreError>;
    async fn insert_menu(&self, menu: &Menu) -> Result<Menu, StoreError>;
    async fn update_menu(&self, id: &EntityId, patch: &MenuPatch) -> Result<Menu, StoreError>;
    async fn delete_menu(&self, id: &EntityId) -> Result<(), StoreError>;
}
