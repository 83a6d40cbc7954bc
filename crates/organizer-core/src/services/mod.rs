//! Domain services (business logic)

pub mod network;
pub mod rate_limiter;
pub mod access_resolver;
pub mod retry;
pub mod offline_queue;
pub mod menu_view;
pub mod metrics;
pub mod gateway;
pub mod reconciler;

pub use network::{spawn_probe_loop, NetworkSnapshot, NetworkState};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use access_resolver::AccessResolver;
pub use retry::{RetryExecutor, RetryPolicy, Retryable};
pub use offline_queue::OfflineQueue;
pub use menu_view::{MenuView, SessionViews};
pub use metrics::GatewayMetrics;
pub use gateway::{GatewayLimits, GatewayServices, MutationGateway};
pub use reconciler::{Reconciler, ReconcilerConfig, SyncReport};
