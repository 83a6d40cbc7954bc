// ============================================================================
// Organizer Core - Menu View
// File: crates/organizer-core/src/services/menu_view.rs
// ============================================================================
//! Local view model of the menus one identity can see.
//!
//! Optimistic local writes, replay results and real-time echoes can arrive
//! in any order, so every merge is idempotent by menu id: an insert of a
//! known id, an update of an unknown id and a delete of a missing id are
//! all no-ops.

use chrono::Utc;
use dashmap::DashMap;
use organizer_shared::{EntityId, Identity};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::{
    AccessSubject, AppliedChange, ChangeEvent, ChangeEventType, Membership, Menu, MenuMutation,
};

#[derive(Default)]
struct ViewState {
    menus: HashMap<EntityId, Menu>,
    /// Memberships of this identity, keyed by menu id.
    memberships: HashMap<EntityId, Membership>,
}

pub struct MenuView {
    identity: Identity,
    state: RwLock<ViewState>,
    visible_tx: watch::Sender<Vec<Menu>>,
}

impl MenuView {
    pub fn new(identity: Identity) -> Self {
        let (visible_tx, _) = watch::channel(Vec::new());
        Self {
            identity,
            state: RwLock::new(ViewState::default()),
            visible_tx,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Replace the whole view with a fresh store read.
    pub fn replace_all(&self, menus: Vec<Menu>, memberships: Vec<Membership>) {
        {
            let mut state = self.state.write();
            state.menus = menus.into_iter().map(|m| (m.id, m)).collect();
            state.memberships = memberships
                .into_iter()
                .filter(|m| m.member_id == self.identity)
                .map(|m| (m.menu_id, m))
                .collect();
        }
        self.publish();
    }

    /// Merge a change-stream event. Returns whether the view changed.
    pub fn apply_event(&self, event: &ChangeEvent) -> bool {
        let changed = {
            let mut state = self.state.write();
            match event.event_type {
                ChangeEventType::Insert => match &event.new {
                    Some(menu) if !state.menus.contains_key(&menu.id) => {
                        state.menus.insert(menu.id, menu.clone());
                        true
                    }
                    _ => false,
                },
                ChangeEventType::Update => match &event.new {
                    Some(menu) => match state.menus.get_mut(&menu.id) {
                        Some(existing) if existing != menu => {
                            *existing = menu.clone();
                            true
                        }
                        _ => false,
                    },
                    None => false,
                },
                ChangeEventType::Delete => match event.menu_id() {
                    Some(id) => {
                        state.memberships.remove(&id);
                        state.menus.remove(&id).is_some()
                    }
                    None => false,
                },
            }
        };

        debug!(identity = %self.identity, menu_id = ?event.menu_id(), changed, "Change event merged");
        if changed {
            self.publish();
        }
        changed
    }

    /// Record what the store returned for an applied mutation.
    pub fn apply_change(&self, change: &AppliedChange) {
        {
            let mut state = self.state.write();
            match change {
                AppliedChange::Created(menu) | AppliedChange::Updated(menu) => {
                    state.menus.insert(menu.id, menu.clone());
                }
                AppliedChange::Deleted(id) => {
                    state.menus.remove(id);
                    state.memberships.remove(id);
                }
                AppliedChange::Reordered(menus) => {
                    for menu in menus {
                        state.menus.insert(menu.id, menu.clone());
                    }
                }
            }
        }
        self.publish();
    }

    /// Optimistically apply a mutation that is still waiting in the queue.
    pub fn apply_pending(&self, mutation: &MenuMutation) {
        let now = Utc::now();
        {
            let mut state = self.state.write();
            match mutation {
                MenuMutation::Create(menu) => {
                    state.menus.insert(menu.id, menu.clone());
                }
                MenuMutation::Update { menu_id, patch } => {
                    if let Some(menu) = state.menus.get_mut(menu_id) {
                        patch.apply_to(menu, now);
                    }
                }
                MenuMutation::Delete { menu_id } => {
                    state.menus.remove(menu_id);
                    state.memberships.remove(menu_id);
                }
                MenuMutation::Reorder { orders } => {
                    for entry in orders {
                        if let Some(menu) = state.menus.get_mut(&entry.menu_id) {
                            menu.order = entry.order;
                            menu.updated_at = now;
                        }
                    }
                }
            }
        }
        self.publish();
    }

    pub fn find(&self, id: &EntityId) -> Option<Menu> {
        self.state.read().menus.get(id).cloned()
    }

    pub fn membership(&self, menu_id: &EntityId) -> Option<Membership> {
        self.state.read().memberships.get(menu_id).cloned()
    }

    /// Menus in the view owned by `owner`.
    pub fn owned_by(&self, owner: &Identity) -> Vec<Menu> {
        self.state
            .read()
            .menus
            .values()
            .filter(|m| m.is_owned_by(owner))
            .cloned()
            .collect()
    }

    /// Menus this identity may view, sorted by order then name.
    pub fn visible(&self) -> Vec<Menu> {
        let state = self.state.read();
        let mut menus: Vec<Menu> = state
            .menus
            .values()
            .filter(|m| {
                AccessSubject::classify(Some(m), state.memberships.get(&m.id), &self.identity)
                    .decision()
                    .can_view
            })
            .cloned()
            .collect();
        menus.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        menus
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Menu>> {
        self.visible_tx.subscribe()
    }

    fn publish(&self) {
        self.visible_tx.send_replace(self.visible());
    }
}

/// One view per identity, shared by every session of that identity.
#[derive(Default)]
pub struct SessionViews {
    views: DashMap<Identity, Arc<MenuView>>,
}

impl SessionViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_for(&self, identity: &Identity) -> Arc<MenuView> {
        self.views
            .entry(*identity)
            .or_insert_with(|| Arc::new(MenuView::new(*identity)))
            .clone()
    }

    pub fn get(&self, identity: &Identity) -> Option<Arc<MenuView>> {
        self.views.get(identity).map(|v| v.clone())
    }

    pub fn all(&self) -> Vec<Arc<MenuView>> {
        self.views.iter().map(|v| v.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemberRole, MenuPatch};
    use organizer_shared::{new_id, MenuType};
    use serde_json::json;

    fn menu(owner: Identity, name: &str, order: i32) -> Menu {
        let now = Utc::now();
        Menu {
            id: new_id(),
            owner_id: owner,
            name: name.into(),
            menu_type: MenuType::Dashboard,
            config: json!({}),
            order,
            is_private: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_rules_are_idempotent() {
        let me = new_id();
        let view = MenuView::new(me);
        let m = menu(me, "Debts", 0);

        assert!(view.apply_event(&ChangeEvent::inserted(m.clone())));
        assert!(!view.apply_event(&ChangeEvent::inserted(m.clone())));

        let mut renamed = m.clone();
        renamed.name = "A".into();
        assert!(view.apply_event(&ChangeEvent::updated(renamed.clone())));
        assert!(!view.apply_event(&ChangeEvent::updated(renamed.clone())));

        let stranger = menu(me, "Ghost", 1);
        assert!(!view.apply_event(&ChangeEvent::updated(stranger)));

        assert!(view.apply_event(&ChangeEvent::deleted(m.id, None)));
        assert!(!view.apply_event(&ChangeEvent::deleted(m.id, None)));
        assert!(view.visible().is_empty());
    }

    #[test]
    fn test_optimistic_update_then_echo_leaves_one_copy() {
        let me = new_id();
        let view = MenuView::new(me);
        let m = menu(me, "Debts", 0);
        view.replace_all(vec![m.clone()], vec![]);

        view.apply_pending(&MenuMutation::Update {
            menu_id: m.id,
            patch: MenuPatch { name: Some("A".into()), ..MenuPatch::default() },
        });
        let mut echoed = m.clone();
        echoed.name = "A".into();
        view.apply_event(&ChangeEvent::updated(echoed.clone()));
        view.apply_event(&ChangeEvent::inserted(echoed));

        let visible = view.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "A");
    }

    #[test]
    fn test_visibility_follows_access_rules() {
        let me = new_id();
        let other = new_id();
        let view = MenuView::new(me);

        let mut private_group = menu(other, "Private guild", 0);
        private_group.menu_type = MenuType::Group;
        private_group.is_private = true;
        let mut member_group = private_group.clone();
        member_group.id = new_id();
        member_group.name = "My guild".into();
        let foreign_dashboard = menu(other, "Their board", 0);
        let mine = menu(me, "Mine", 5);

        let membership = Membership {
            menu_id: member_group.id,
            member_id: me,
            role: MemberRole::Member,
            joined_at: Utc::now(),
        };
        view.replace_all(
            vec![private_group, member_group.clone(), foreign_dashboard, mine.clone()],
            vec![membership],
        );

        let names: Vec<String> = view.visible().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["My guild".to_string(), "Mine".to_string()]);
    }

    #[test]
    fn test_subscribers_receive_visible_menus() {
        let me = new_id();
        let view = MenuView::new(me);
        let rx = view.subscribe();
        view.apply_change(&AppliedChange::Created(menu(me, "Raids", 0)));
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn test_sessions_share_a_view() {
        let views = SessionViews::new();
        let me = new_id();
        let a = views.view_for(&me);
        let b = views.view_for(&me);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
