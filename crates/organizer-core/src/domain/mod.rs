//! # Organizer Core - Domain Module
//!
//! Domain entities for the menu mutation pipeline.

pub mod menu;
pub mod membership;
pub mod access;
pub mod action;
pub mod event;
pub mod audit;

// Re-export all entities and enums
pub use menu::{Menu, MenuOrder, MenuPatch, NewMenu};
pub use membership::{MemberRole, Membership};
pub use access::{AccessDecision, AccessSubject, DenyReason};
pub use action::{decode_actions, encode_actions, ActionKind, MenuMutation, OfflineAction};
pub use event::{ChangeEvent, ChangeEventType, MenuRef};
pub use audit::{AuditEntry, Severity};

use serde::Serialize;

/// Result of a mutation that passed every check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum MutationOutcome<T> {
    /// The store accepted the mutation.
    Applied(T),
    /// Queued for replay; carries the offline action id.
    Queued(organizer_shared::EntityId),
}

impl<T> MutationOutcome<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Queued(_) => None,
        }
    }
}

/// What the store returned for an applied mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", content = "data", rename_all = "lowercase")]
pub enum AppliedChange {
    Created(Menu),
    Updated(Menu),
    Deleted(organizer_shared::EntityId),
    Reordered(Vec<Menu>),
}
