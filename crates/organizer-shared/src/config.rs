//! Configuration management

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::telemetry::TelemetrySettings;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub store: StoreSettings,
    pub realtime: RealtimeSettings,
    pub storage: StorageSettings,
    pub rate_limit: RateLimitSettings,
    pub retry: RetrySettings,
    pub queue: QueueSettings,
    pub limits: LimitSettings,
    pub probe: ProbeSettings,
    pub auth: AuthSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub enabled: bool,
    pub database_url: String,
    pub channel: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JournalFormat {
    /// One JSON array per identity, rewritten on every mutation
    Snapshot,
    /// Append-only log per identity with periodic compaction
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub data_dir: String,
    pub journal: JournalFormat,
    pub compact_threshold: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_actions: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    pub staleness_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitSettings {
    pub max_menus_per_owner: usize,
    pub max_config_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeSettings {
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub token_secret: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let config = Config::builder()
            .set_default("app.env", "development")?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080)?
            .set_default("app.name", "organizer-server")?
            .set_default("store.url", "http://127.0.0.1:54321")?
            .set_default("store.api_key", "")?
            .set_default("store.timeout_ms", 10_000)?
            .set_default("realtime.enabled", false)?
            .set_default("realtime.database_url", "postgres://localhost/organizer")?
            .set_default("realtime.channel", crate::constants::DEFAULT_CHANGE_CHANNEL)?
            .set_default("storage.data_dir", "data")?
            .set_default("storage.journal", "log")?
            .set_default("storage.compact_threshold", 64)?
            .set_default("rate_limit.window_secs", crate::constants::DEFAULT_RATE_LIMIT_WINDOW_SECS)?
            .set_default("rate_limit.max_actions", crate::constants::DEFAULT_RATE_LIMIT_MAX_ACTIONS)?
            .set_default("retry.max_retries", crate::constants::DEFAULT_MAX_RETRIES)?
            .set_default("retry.base_delay_ms", crate::constants::DEFAULT_BASE_DELAY_MS)?
            .set_default("retry.max_delay_ms", crate::constants::DEFAULT_MAX_DELAY_MS)?
            .set_default("retry.factor", crate::constants::DEFAULT_BACKOFF_FACTOR)?
            .set_default("queue.staleness_hours", crate::constants::DEFAULT_STALENESS_HOURS)?
            .set_default("limits.max_menus_per_owner", crate::constants::DEFAULT_MAX_MENUS_PER_OWNER as u64)?
            .set_default("limits.max_config_bytes", crate::constants::MAX_CONFIG_BYTES as u64)?
            .set_default("probe.interval_secs", crate::constants::DEFAULT_PROBE_INTERVAL_SECS)?
            .set_default("auth.token_secret", "change-me")?
            .set_default("telemetry.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("ORGANIZER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_storage_settings_parse_journal_format() {
        let raw = r#"{ "data_dir": "./data", "journal": "log", "compact_threshold": 64 }"#;
        let settings: StorageSettings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.journal, JournalFormat::Log);
        assert_eq!(settings.compact_threshold, 64);
    }

    #[test]
    fn test_unknown_journal_format_is_rejected() {
        let raw = r#"{ "data_dir": "./data", "journal": "sqlite", "compact_threshold": 64 }"#;
        let result = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize::<StorageSettings>();

        assert!(result.is_err());
    }
}
