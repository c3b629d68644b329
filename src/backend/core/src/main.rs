//! Goods Server - Main entry point

use std::sync::Arc;

use goods_core::{
    api::{self, AppState},
    audit::{AuditLogger, LogConsumer},
    bus::{EventBus, InMemoryBus, NatsBus},
    cache::{CacheBackend, GoodsCache, InMemoryBackend, RedisBackend, RedisConfig},
    config::{BusBackend, CacheBackendKind, Config, SinkBackend, StoreBackend},
    db::{Database, PoolSettings},
    repository::{GoodsRepository, InMemoryGoodsRepository, PgGoodsRepository},
    service::{GoodsService, RetryPolicy},
    sink::{EventSink, MemorySink, SinkWriter, SqlSink},
    telemetry::{self, redact_url},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize logging and metrics
    let metrics = telemetry::init_telemetry(&config.logging, &config.metrics, &config.environment)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Starting Goods Server"
    );

    // Goods store
    let (repo, database): (Arc<dyn GoodsRepository>, Option<Database>) = match config.store.backend {
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            if config.database.run_migrations {
                db.migrate().await?;
            }
            tracing::info!(url = %redact_url(&config.database.url), "Connected to database");
            let repo: Arc<dyn GoodsRepository> = Arc::new(PgGoodsRepository::new(db.pool().clone()));
            (repo, Some(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory goods store, data is lost on restart");
            let repo: Arc<dyn GoodsRepository> = Arc::new(InMemoryGoodsRepository::new());
            (repo, None)
        }
    };

    // Read-through cache
    let cache_backend: Arc<dyn CacheBackend> = match config.cache.backend {
        CacheBackendKind::Redis => {
            let backend = RedisBackend::new(RedisConfig {
                url: config.cache.url.clone(),
                key_prefix: config.cache.key_prefix.clone(),
            })
            .await?;
            tracing::info!(url = %redact_url(&config.cache.url), "Connected to Redis");
            Arc::new(backend)
        }
        CacheBackendKind::Memory => Arc::new(InMemoryBackend::new()),
    };
    let cache = GoodsCache::new(cache_backend, config.cache.ttl);

    // Event bus
    let bus: Arc<dyn EventBus> = match config.bus.backend {
        BusBackend::Nats => Arc::new(NatsBus::connect(&config.bus.url).await?),
        BusBackend::Memory => Arc::new(InMemoryBus::new()),
    };

    // Audit sink
    let (sink, sql_sink): (Arc<dyn EventSink>, Option<Arc<SqlSink>>) = match config.sink.backend {
        SinkBackend::Postgres => {
            let sql = Arc::new(
                SqlSink::connect(
                    &config.sink.url,
                    &config.sink.table,
                    &PoolSettings::from(&config.database),
                )
                .await?,
            );
            if config.sink.create_table {
                sql.ensure_table().await?;
            }
            let sink: Arc<dyn EventSink> = sql.clone();
            (sink, Some(sql))
        }
        SinkBackend::Memory => {
            let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
            (sink, None)
        }
    };

    let writer = Arc::new(SinkWriter::from_config(sink, &config.sink));
    let consumer = LogConsumer::start(bus.clone(), &config.bus.subject, writer).await?;

    // Service and router
    let audit = AuditLogger::new(bus.clone(), config.bus.subject.clone());
    let service = GoodsService::new(repo, cache, audit)
        .with_retry_policy(RetryPolicy::from(&config.store));
    let app = api::build_router_with_config(AppState::new(service, metrics), &config.server);

    // Start server
    let addr = config.listen_addr();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: flush the bus, drain the audit pipeline, then close connections
    if let Err(e) = bus.flush().await {
        tracing::warn!(error = %e, "Event bus flush failed");
    }
    match consumer.stop().await {
        Ok(report) => tracing::info!(
            written = report.written,
            skipped = report.skipped,
            "Audit pipeline drained"
        ),
        Err(e) => tracing::error!(error = %e, "Final audit flush failed, events lost"),
    }
    if let Some(sql) = sql_sink {
        sql.close().await;
    }
    if let Some(db) = database {
        db.close().await;
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
