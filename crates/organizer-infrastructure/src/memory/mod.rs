//! In-memory adapters for tests and local development

pub mod menu_store;

pub use menu_store::InMemoryMenuStore;
