// ============================================================================
// Organizer Core - Access Decisions
// File: crates/organizer-core/src/domain/access.rs
// ============================================================================
//! Capability sets computed per (menu, identity) check. Never persisted.

use organizer_shared::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{MemberRole, Membership, Menu};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotFound,
    OwnerOnly,
    Private,
    NotMember,
    InsufficientRole,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "menu not found",
            Self::OwnerOnly => "only the owner can access this menu",
            Self::Private => "menu is private",
            Self::NotMember => "not a member of this menu",
            Self::InsufficientRole => "role does not allow this action",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage_members: bool,
    pub role: Option<MemberRole>,
    pub reason: Option<DenyReason>,
}

impl AccessDecision {
    fn deny(reason: DenyReason) -> Self {
        Self {
            can_view: false,
            can_edit: false,
            can_delete: false,
            can_manage_members: false,
            role: None,
            reason: Some(reason),
        }
    }

    /// Reason to report when a capability is missing.
    pub fn denial(&self) -> DenyReason {
        self.reason.unwrap_or(DenyReason::InsufficientRole)
    }
}

/// Where an identity stands relative to a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSubject {
    NotFound,
    Owner,
    /// Non-owner on a menu type that cannot be shared.
    OwnerOnly,
    Admin,
    Member,
    PublicVisitor,
    PrivateVisitor,
}

impl AccessSubject {
    pub fn classify(menu: Option<&Menu>, membership: Option<&Membership>, identity: &Identity) -> Self {
        let Some(menu) = menu else {
            return Self::NotFound;
        };
        if menu.is_owned_by(identity) {
            return Self::Owner;
        }
        if !menu.menu_type.is_shareable() {
            return Self::OwnerOnly;
        }

        let membership = membership.filter(|m| m.menu_id == menu.id && m.member_id == *identity);
        match membership.map(|m| m.role) {
            // An owner row for someone other than the menu owner grants no more than admin.
            Some(MemberRole::Owner) | Some(MemberRole::Admin) => Self::Admin,
            Some(MemberRole::Member) => Self::Member,
            None if menu.is_private => Self::PrivateVisitor,
            None => Self::PublicVisitor,
        }
    }

    pub fn decision(self) -> AccessDecision {
        match self {
            Self::NotFound => AccessDecision::deny(DenyReason::NotFound),
            Self::OwnerOnly => AccessDecision::deny(DenyReason::OwnerOnly),
            Self::PrivateVisitor => AccessDecision::deny(DenyReason::Private),
            Self::Owner => AccessDecision {
                can_view: true,
                can_edit: true,
                can_delete: true,
                can_manage_members: true,
                role: Some(MemberRole::Owner),
                reason: None,
            },
            Self::Admin => AccessDecision {
                can_view: true,
                can_edit: true,
                can_delete: false,
                can_manage_members: true,
                role: Some(MemberRole::Admin),
                reason: None,
            },
            Self::Member => AccessDecision {
                can_view: true,
                can_edit: false,
                can_delete: false,
                can_manage_members: false,
                role: Some(MemberRole::Member),
                reason: None,
            },
            Self::PublicVisitor => AccessDecision {
                can_view: true,
                can_edit: false,
                can_delete: false,
                can_manage_members: false,
                role: None,
                reason: Some(DenyReason::NotMember),
            },
        }
    }
}
