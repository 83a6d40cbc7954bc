//! Real-time change stream adapters

pub mod listener;

pub use listener::PgChangeListener;
