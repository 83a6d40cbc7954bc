//! Access resolution against the store

use organizer_shared::{EntityId, Identity};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{AccessDecision, AccessSubject, Menu};
use crate::error::StoreError;
use crate::repositories::MenuStore;

/// Computes capability sets. "No access" is a decision with a reason, never
/// an error; only store failures propagate, and callers must treat those as
/// "deny and retry".
pub struct AccessResolver<S: MenuStore> {
    store: Arc<S>,
}

impl<S: MenuStore> AccessResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, menu_id: &EntityId, identity: &Identity) -> Result<AccessDecision, StoreError> {
        let menu = self.store.find_menu(menu_id).await?;
        self.resolve_menu(menu.as_ref(), identity).await
    }

    /// Resolve for an already loaded menu. The membership row is fetched only
    /// when it can change the answer.
    pub async fn resolve_menu(&self, menu: Option<&Menu>, identity: &Identity) -> Result<AccessDecision, StoreError> {
        let membership = match menu {
            Some(m) if !m.is_owned_by(identity) && m.menu_type.is_shareable() => {
                self.store.find_membership(&m.id, identity).await?
            }
            _ => None,
        };

        let subject = AccessSubject::classify(menu, membership.as_ref(), identity);
        debug!(identity = %identity, menu_id = ?menu.map(|m| m.id), ?subject, "Access resolved");
        Ok(subject.decision())
    }
}
