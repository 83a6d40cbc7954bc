//! Per-identity fixed-window action counter

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use organizer_shared::constants::{DEFAULT_RATE_LIMIT_MAX_ACTIONS, DEFAULT_RATE_LIMIT_WINDOW_SECS};
use organizer_shared::config::RateLimitSettings;
use organizer_shared::Identity;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_actions: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_RATE_LIMIT_WINDOW_SECS as i64),
            max_actions: DEFAULT_RATE_LIMIT_MAX_ACTIONS,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            window: Duration::seconds(settings.window_secs as i64),
            max_actions: settings.max_actions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Never blocks: callers decide what to do with a denial.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<Identity, RateLimitWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, identity: &Identity) -> RateLimitStatus {
        self.check_at(identity, Utc::now())
    }

    pub fn check_at(&self, identity: &Identity, now: DateTime<Utc>) -> RateLimitStatus {
        let window = self.config.window;
        self.windows.retain(|_, w| now - w.window_start <= window);

        let mut entry = self.windows.entry(*identity).or_insert(RateLimitWindow {
            count: 0,
            window_start: now,
        });
        let reset_at = entry.window_start + window;

        // A denied check leaves the counter alone.
        if entry.count >= self.config.max_actions {
            debug!(identity = %identity, %reset_at, "Rate limit reached");
            return RateLimitStatus {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        entry.count += 1;
        RateLimitStatus {
            allowed: true,
            remaining: self.config.max_actions - entry.count,
            reset_at,
        }
    }

    /// Windows currently tracked, stale ones included until the next check.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
