//! Draftday engine binary.
//!
//! Wires the draft manager to its backing store and cache, rebuilds every
//! in-flight countdown, and serves the observer API until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `draftday-config.yaml` (or `DRAFTDAY_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect `PostgreSQL` and `Dragonfly`, or fall back to in-memory
//! 4. Seed the default item pool
//! 5. Recover countdowns left behind by a previous process
//! 6. Start the observer heartbeat sweep
//! 7. Start the observer API server
//! 8. Wait for `Ctrl-C`, then stop timers and close connections

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use draftday_core::DraftManager;
use draftday_core::cache::StateCache;
use draftday_core::config::{DraftdayConfig, LoggingConfig};
use draftday_core::fanout::FanOut;
use draftday_core::memory::{InMemoryCache, InMemoryStore};
use draftday_core::store::DraftStore;
use draftday_db::{DragonflyCache, PgDraftStore, PostgresPool};
use draftday_observer::{AppState, ServerConfig};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const DEFAULT_CONFIG_PATH: &str = "draftday-config.yaml";

/// Application entry point for the engine.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, config_path) = load_config().context("loading configuration")?;
    init_tracing(&config.logging);
    info!(
        config = %config_path.display(),
        preparation_seconds = config.draft.preparation_seconds,
        default_pick_seconds = config.draft.default_pick_seconds,
        tick_interval_ms = config.draft.tick_interval_ms,
        "draftday-engine starting"
    );

    run(config).await.context("draftday-engine failed")?;
    info!("draftday-engine shutdown complete");
    Ok(())
}

/// Everything after configuration and logging.
async fn run(config: DraftdayConfig) -> Result<(), EngineError> {
    // Backends.
    let (store, postgres) = connect_store(&config).await?;
    let (cache, dragonfly) = connect_cache(&config).await;

    let manager = DraftManager::builder(store, config.clone())
        .cache(cache)
        .build();

    // Pool and recovery.
    let seeded = manager.seed_default_pool().await?;
    info!(seeded, "item pool ready");

    let report = manager.recover().await?;
    info!(
        resumed = report.resumed,
        restarted = report.restarted,
        expired = report.expired,
        completed = report.completed,
        discarded_timers = report.discarded_timers,
        "recovery complete"
    );

    // Background services.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let heartbeat = tokio::spawn(heartbeat_loop(
        Arc::clone(manager.fanout()),
        config.fanout.heartbeat_interval(),
        shutdown_rx.clone(),
    ));

    let server_config = ServerConfig {
        host: config.infrastructure.observer_host.clone(),
        port: config.infrastructure.observer_port,
    };
    let observer = draftday_observer::spawn_observer(
        server_config,
        Arc::new(AppState::new(manager.clone())),
        wait_for_shutdown(shutdown_rx),
    )?;

    tokio::signal::ctrl_c().await.map_err(EngineError::Signal)?;
    info!("shutdown signal received");

    if shutdown_tx.send(true).is_err() {
        debug!("no background task was listening for shutdown");
    }
    manager.shutdown();
    if let Err(e) = observer.await {
        warn!(error = %e, "observer task ended abnormally");
    }
    if let Err(e) = heartbeat.await {
        warn!(error = %e, "heartbeat task ended abnormally");
    }

    if let Some(cache) = dragonfly {
        cache.quit().await;
    }
    if let Some(pool) = postgres {
        pool.close().await;
    }
    Ok(())
}

/// Load `DRAFTDAY_CONFIG` or `draftday-config.yaml`; defaults when the
/// file is absent.
fn load_config() -> Result<(DraftdayConfig, PathBuf), EngineError> {
    let path = std::env::var_os("DRAFTDAY_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = if path.exists() {
        DraftdayConfig::from_file(&path)?
    } else {
        DraftdayConfig::parse("")?
    };
    Ok((config, path))
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `PostgreSQL` when configured, otherwise the in-memory store.
async fn connect_store(
    config: &DraftdayConfig,
) -> Result<(Arc<dyn DraftStore>, Option<PostgresPool>), EngineError> {
    match &config.infrastructure.postgres_url {
        Some(url) => {
            info!("connecting to PostgreSQL");
            let pool = PostgresPool::connect_and_migrate(url).await?;
            let store: Arc<dyn DraftStore> = Arc::new(PgDraftStore::new(pool.pool().clone()));
            Ok((store, Some(pool)))
        }
        None => {
            warn!("no postgres_url configured, drafts will not survive a restart");
            Ok((Arc::new(InMemoryStore::new()), None))
        }
    }
}

/// `Dragonfly` when configured and reachable, otherwise the in-memory
/// cache. The cache is never authoritative, so an unreachable one is not
/// fatal.
async fn connect_cache(
    config: &DraftdayConfig,
) -> (Arc<dyn StateCache>, Option<DragonflyCache>) {
    let Some(url) = &config.infrastructure.dragonfly_url else {
        return (Arc::new(InMemoryCache::new()), None);
    };
    match DragonflyCache::connect(url).await {
        Ok(cache) => (Arc::new(cache.clone()), Some(cache)),
        Err(e) => {
            warn!(error = %e, "Dragonfly unavailable, using in-process cache");
            (Arc::new(InMemoryCache::new()), None)
        }
    }
}

/// Resolves once `true` has been sent on the shutdown channel or the
/// sender is gone.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Ping every observer each `period` and prune the ones that never
/// answered the previous ping.
async fn heartbeat_loop(fanout: Arc<FanOut>, period: Duration, shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let stop = wait_for_shutdown(shutdown);
    tokio::pin!(stop);
    loop {
        tokio::select! {
            () = &mut stop => break,
            _ = interval.tick() => {
                let report = fanout.sweep();
                if report.pruned > 0 {
                    info!(pinged = report.pinged, pruned = report.pruned, "pruned silent observers");
                } else {
                    debug!(pinged = report.pinged, "heartbeat sweep");
                }
            }
        }
    }
    debug!("heartbeat loop stopped");
}
