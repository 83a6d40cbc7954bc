use anyhow::{Context, Result};
use organizer_api::{build_router, AppState};
use organizer_core::repositories::{
    ActionJournal, ChangeHub, ConnectivityProbe, LocalStore, MenuStore, SnapshotJournal,
};
use organizer_core::services::{
    spawn_probe_loop, GatewayLimits, GatewayMetrics, GatewayServices, MutationGateway, NetworkState,
    OfflineQueue, RateLimitConfig, RateLimiter, Reconciler, ReconcilerConfig, RetryPolicy, SessionViews,
};
use organizer_infrastructure::{
    AuditLogger, AuditLoggerConfig, FileLocalStore, InMemoryMenuStore, LogJournal, PgChangeListener,
    RestMenuStore,
};
use organizer_security::{ContentValidator, JwtService, ValidatorConfig};
use organizer_shared::config::{AppConfig, JournalFormat};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Lifetime of tokens issued with the configured secret.
const TOKEN_EXPIRY_SECS: i64 = 24 * 3600;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    let _guard = organizer_shared::telemetry::init_telemetry(&config.telemetry)?;

    info!("🚀 Starting {} ({})", config.app.name, config.app.env);

    let hub = Arc::new(ChangeHub::default());
    if config.store.url.starts_with("memory:") {
        warn!("Using the in-memory menu store; data is lost on exit");
        let store = Arc::new(InMemoryMenuStore::new(hub.clone()));
        run(config, store, hub).await
    } else {
        let store = Arc::new(RestMenuStore::new(&config.store)?);
        info!("✅ Menu store at {}", config.store.url);
        run(config, store, hub).await
    }
}

async fn run<S>(config: AppConfig, store: Arc<S>, hub: Arc<ChangeHub>) -> Result<()>
where
    S: MenuStore + ConnectivityProbe + 'static,
{
    // Local persistence
    let data_dir = Path::new(&config.storage.data_dir);
    let local_store: Arc<dyn LocalStore> = Arc::new(FileLocalStore::open(data_dir.join("kv")).await?);
    let journal: Arc<dyn ActionJournal> = match config.storage.journal {
        JournalFormat::Snapshot => Arc::new(SnapshotJournal::new(Arc::new(
            FileLocalStore::open(data_dir.join("queues")).await?,
        ))),
        JournalFormat::Log => Arc::new(LogJournal::open(data_dir.join("journal"), config.storage.compact_threshold).await?),
    };
    info!("✅ Offline journal ready ({:?})", config.storage.journal);

    let audit = Arc::new(AuditLogger::new(local_store, AuditLoggerConfig::default()));

    // Pipeline
    let network = Arc::new(NetworkState::new());
    let services = GatewayServices {
        network: network.clone(),
        queue: Arc::new(OfflineQueue::new(journal)),
        limiter: Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit))),
        views: Arc::new(SessionViews::new()),
    };
    let validator = ContentValidator::new(ValidatorConfig {
        max_config_bytes: config.limits.max_config_bytes,
        ..ValidatorConfig::default()
    });
    let metrics = Arc::new(GatewayMetrics::new()?);
    let gateway = Arc::new(MutationGateway::new(
        store.clone(),
        services,
        validator,
        RetryPolicy::from(&config.retry),
        audit,
        metrics,
        GatewayLimits::from(&config.limits),
    ));
    let reconciler = Arc::new(Reconciler::new(gateway.clone(), ReconcilerConfig::from(&config.queue)));

    // Background tasks
    let probe: Arc<dyn ConnectivityProbe> = store;
    spawn_probe_loop(probe, network, Duration::from_secs(config.probe.interval_secs));
    reconciler.clone().watch_connectivity();
    reconciler.merge_changes(hub.subscribe_all());
    if config.realtime.enabled {
        PgChangeListener::new(&config.realtime, hub.clone()).start();
    } else {
        info!("Real-time change listener disabled");
    }

    let state = AppState {
        gateway,
        reconciler,
        jwt: Arc::new(JwtService::new(config.auth.token_secret.clone(), TOKEN_EXPIRY_SECS)),
    };
    let app = build_router(state);

    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
