//! Durable local storage: key/value files and the append-only action journal

pub mod file_store;
pub mod log_journal;

pub use file_store::FileLocalStore;
pub use log_journal::LogJournal;
