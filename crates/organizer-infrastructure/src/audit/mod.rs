//! Background audit logging

pub mod logger;

pub use logger::{read_audit_log, AuditLogger, AuditLoggerConfig};
