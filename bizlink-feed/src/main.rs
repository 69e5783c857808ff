//! bizlink-feed - feed ranking and matching service
//!
//! Serves the aggregated content feed, people suggestions and taxonomy
//! metadata over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bizlink_common::config::{resolve_config_path, ServiceConfig};
use bizlink_common::db::init_database;
use bizlink_feed::cache::memory::MemoryCache;
use bizlink_feed::cache::redis::RedisCache;
use bizlink_feed::cache::CacheStore;
use bizlink_feed::repo::sqlite::SqliteStore;
use bizlink_feed::repo::TaxonomyRepository;
use bizlink_feed::{build_router, AppState};

/// Command-line arguments for bizlink-feed
#[derive(Parser, Debug)]
#[command(name = "bizlink-feed")]
#[command(about = "Feed ranking and matching service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "BIZLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overrides the config file
    #[arg(short, long, env = "BIZLINK_BIND")]
    bind: Option<String>,

    /// SQLite database file, overrides the config file
    #[arg(short, long, env = "BIZLINK_DATABASE")]
    database: Option<PathBuf>,

    /// Redis URL, overrides the config file
    #[arg(long, env = "BIZLINK_REDIS_URL")]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizlink_feed=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting bizlink-feed v{}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config =
        ServiceConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if args.redis_url.is_some() {
        config.redis_url = args.redis_url;
    }

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let cache_store = connect_cache(config.redis_url.as_deref()).await;

    let store = Arc::new(SqliteStore::new(pool));
    let catalog = store
        .load_catalog()
        .await
        .context("Failed to load taxonomy catalog")?;
    info!(identities = catalog.identity_count(), "Taxonomy catalog loaded");

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(store, cache_store, catalog, config);
    let app = build_router(state);

    info!("Starting HTTP server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Redis when configured and reachable, otherwise the in-process cache
async fn connect_cache(redis_url: Option<&str>) -> Arc<dyn CacheStore> {
    let Some(url) = redis_url else {
        info!("No Redis URL configured, using in-process cache");
        return Arc::new(MemoryCache::new());
    };

    match RedisCache::connect(url).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            warn!("Redis unavailable ({}), falling back to in-process cache", e);
            Arc::new(MemoryCache::new())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
