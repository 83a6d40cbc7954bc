// ============================================================================
// Organizer Infrastructure - In-memory Menu Store
// File: crates/organizer-infrastructure/src/memory/menu_store.rs
// ============================================================================
//! MenuStore kept in process memory. Every write is published to a
//! [`ChangeHub`] the way the real store's change stream would, and faults
//! can be injected to exercise retry and offline paths.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use organizer_core::domain::{ChangeEvent, Membership, Menu, MenuPatch};
use organizer_core::error::StoreError;
use organizer_core::repositories::{ChangeHub, ConnectivityProbe, MenuStore};
use organizer_shared::{EntityId, Identity};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

pub struct InMemoryMenuStore {
    menus: DashMap<EntityId, Menu>,
    memberships: DashMap<(EntityId, Identity), Membership>,
    hub: Arc<ChangeHub>,
    reachable: AtomicBool,
    faults: Mutex<VecDeque<StoreError>>,
}

impl Default for InMemoryMenuStore {
    fn default() -> Self {
        Self::new(Arc::new(ChangeHub::default()))
    }
}

impl InMemoryMenuStore {
    pub fn new(hub: Arc<ChangeHub>) -> Self {
        Self {
            menus: DashMap::new(),
            memberships: DashMap::new(),
            hub,
            reachable: AtomicBool::new(true),
            faults: Mutex::new(VecDeque::new()),
        }
    }

    pub fn hub(&self) -> &Arc<ChangeHub> {
        &self.hub
    }

    /// Insert a menu without publishing a change.
    pub fn seed_menu(&self, menu: Menu) {
        self.menus.insert(menu.id, menu);
    }

    pub fn add_membership(&self, membership: Membership) {
        self.memberships
            .insert((membership.menu_id, membership.member_id), membership);
    }

    /// Current row, bypassing reachability and faults.
    pub fn menu(&self, id: &EntityId) -> Option<Menu> {
        self.menus.get(id).map(|m| m.clone())
    }

    /// While unreachable every call fails with a transport error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Fail the next call with `error`. Faults queue up in order.
    pub fn fail_next(&self, error: StoreError) {
        self.faults.lock().push_back(error);
    }

    fn check(&self) -> Result<(), StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("store unreachable".into()));
        }
        match self.faults.lock().pop_front() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn sorted(mut menus: Vec<Menu>) -> Vec<Menu> {
        menus.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        menus
    }
}

#[async_trait]
impl MenuStore for InMemoryMenuStore {
    async fn find_menu(&self, id: &EntityId) -> Result<Option<Menu>, StoreError> {
        self.check()?;
        Ok(self.menu(id))
    }

    async fn find_membership(&self, menu_id: &EntityId, member_id: &Identity) -> Result<Option<Membership>, StoreError> {
        self.check()?;
        Ok(self.memberships.get(&(*menu_id, *member_id)).map(|m| m.clone()))
    }

    async fn list_owned(&self, owner_id: &Identity) -> Result<Vec<Menu>, StoreError> {
        self.check()?;
        Ok(Self::sorted(
            self.menus
                .iter()
                .filter(|m| m.is_owned_by(owner_id))
                .map(|m| m.clone())
                .collect(),
        ))
    }

    async fn list_memberships(&self, member_id: &Identity) -> Result<Vec<Membership>, StoreError> {
        self.check()?;
        Ok(self
            .memberships
            .iter()
            .filter(|m| m.member_id == *member_id)
            .map(|m| m.clone())
            .collect())
    }

    async fn list_menus_by_ids(&self, ids: &[EntityId]) -> Result<Vec<Menu>, StoreError> {
        self.check()?;
        Ok(Self::sorted(ids.iter().filter_map(|id| self.menu(id)).collect()))
    }

    async fn list_public_groups(&self) -> Result<Vec<Menu>, StoreError> {
        self.check()?;
        Ok(Self::sorted(
            self.menus
                .iter()
                .filter(|m| m.menu_type.is_shareable() && !m.is_private)
                .map(|m| m.clone())
                .collect(),
        ))
    }

    async fn insert_menu(&self, menu: &Menu) -> Result<Menu, StoreError> {
        self.check()?;
        let duplicate_name = self
            .menus
            .iter()
            .any(|m| m.owner_id == menu.owner_id && m.name == menu.name);
        if self.menus.contains_key(&menu.id) || duplicate_name {
            return Err(StoreError::Conflict(format!("menu {} already exists", menu.id)));
        }

        self.menus.insert(menu.id, menu.clone());
        debug!(menu_id = %menu.id, "Menu inserted");
        self.hub.publish(ChangeEvent::inserted(menu.clone()));
        Ok(menu.clone())
    }

    async fn update_menu(&self, id: &EntityId, patch: &MenuPatch) -> Result<Menu, StoreError> {
        self.check()?;
        let updated = {
            let mut entry = self.menus.get_mut(id).ok_or(StoreError::NotFound)?;
            patch.apply_to(&mut entry, Utc::now());
            entry.clone()
        };

        debug!(menu_id = %id, "Menu updated");
        self.hub.publish(ChangeEvent::updated(updated.clone()));
        Ok(updated)
    }

    async fn delete_menu(&self, id: &EntityId) -> Result<(), StoreError> {
        self.check()?;
        let (_, removed) = self.menus.remove(id).ok_or(StoreError::NotFound)?;
        self.memberships.retain(|(menu_id, _), _| menu_id != id);

        debug!(menu_id = %id, "Menu deleted");
        self.hub.publish(ChangeEvent::deleted(removed.id, Some(removed.owner_id)));
        Ok(())
    }
}

#[async_trait]
impl ConnectivityProbe for InMemoryMenuStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Transport("store unreachable".into()))
        }
    }
}
