//! Application-wide constants

pub const MAX_MENU_NAME_LENGTH: usize = 100;
pub const MAX_CONFIG_BYTES: usize = 50 * 1024;
pub const DEFAULT_MAX_MENUS_PER_OWNER: usize = 50;

pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_MAX_ACTIONS: u32 = 30;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

pub const DEFAULT_STALENESS_HOURS: i64 = 24;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

pub const OFFLINE_ACTIONS_KEY_PREFIX: &str = "offline_actions:";
pub const AUDIT_LOG_KEY: &str = "audit_log";
pub const AUDIT_LOG_CAPACITY: usize = 100;

pub const DEFAULT_CHANGE_CHANNEL: &str = "menu_changes";
