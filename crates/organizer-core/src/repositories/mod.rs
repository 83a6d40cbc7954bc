//! Repository traits (ports)

pub mod menu_store;
pub mod change_feed;
pub mod local_store;
pub mod journal;
pub mod audit_sink;
pub mod probe;

pub use menu_store::MenuStore;
#[cfg(test)]
pub use menu_store::MockMenuStore;
pub use change_feed::{ChangeFeed, ChangeHub};
pub use local_store::{LocalStore, MemoryLocalStore};
pub use journal::{ActionJournal, SnapshotJournal};
pub use audit_sink::{AuditSink, MemoryAuditSink};
pub use probe::ConnectivityProbe;
