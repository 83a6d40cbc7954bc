//! HTTP adapters

pub mod menu_store;

pub use menu_store::RestMenuStore;
