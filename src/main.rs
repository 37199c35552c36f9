use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use route_latency::config::{Config, StoreKind};
use route_latency::latency::Aggregator;
use route_latency::settings::Settings;
use route_latency::store::{AggregateStore, Keys, MemoryStore, RedisStore};
use route_latency::{redis_client, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    // ── 1. Aggregate store ───────────────────────────────────────
    let store: Arc<dyn AggregateStore> = match config.store {
        StoreKind::Redis => {
            let conn = redis_client::connect(&config.redis_url)
                .await
                .context("Make sure redis-server is running, or pass --store memory")?;
            Arc::new(RedisStore::new(conn))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; aggregates are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    let keys = Keys::new(&config.key_prefix);

    // ── 2. Settings are read once, at attach time ────────────────
    let settings = Settings::load(store.as_ref(), &keys)
        .await
        .context("loading latency settings")?;

    // ── 3. Aggregator + shared state ─────────────────────────────
    let aggregator = Arc::new(Aggregator::new(store, keys, config.flush_interval()));
    aggregator.start();
    let state = Arc::new(
        AppState::new(aggregator.clone()).with_unmatched_route(config.unmatched_route.clone()),
    );

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state, &settings);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %config.bind,
        instrumented = settings.enabled,
        "latency report → GET /api/admin/latency"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    // ── 6. Drain staged samples before exit ──────────────────────
    if let Err(e) = aggregator.stop().await {
        tracing::error!(error = %e, "final latency flush failed; staged samples lost");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
