//! # Organizer Core
//!
//! Domain entities, repository ports and the services of the menu mutation
//! pipeline: network state, rate limiting, access resolution, retry,
//! offline queue, gateway and reconciliation.

pub mod domain;
pub mod services;
pub mod repositories;
pub mod error;

// Re-export domain entities
pub use domain::*;
pub use error::{MutationError, StorageError, StoreError};
