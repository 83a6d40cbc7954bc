//! # Organizer Infrastructure
//!
//! Adapters for the organizer ports: the HTTP menu store, the Postgres
//! change listener, file-backed local storage and journals, the background
//! audit logger, and an in-memory store for tests and local runs.

pub mod rest;
pub mod realtime;
pub mod storage;
pub mod audit;
pub mod memory;

pub use rest::RestMenuStore;
pub use realtime::PgChangeListener;
pub use storage::{FileLocalStore, LogJournal};
pub use audit::{AuditLogger, AuditLoggerConfig};
pub use memory::InMemoryMenuStore;
