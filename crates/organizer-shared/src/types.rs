//! Common types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type EntityId = Uuid;

/// The authenticated actor performing a mutation.
pub type Identity = Uuid;

pub fn new_id() -> EntityId {
    Uuid::new_v4()
}

/// Discriminator of a menu page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuType {
    Group,
    Dashboard,
    ExternalLink,
    CustomPage,
    Project,
}

impl MenuType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Dashboard => "dashboard",
            Self::ExternalLink => "external-link",
            Self::CustomPage => "custom-page",
            Self::Project => "project",
        }
    }

    /// Only group menus accept members; every other type is owner-only.
    pub fn is_shareable(&self) -> bool {
        matches!(self, Self::Group)
    }
}

impl fmt::Display for MenuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
