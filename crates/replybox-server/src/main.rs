//! ReplyBox - gateway and reply worker entry point

use anyhow::{Context, Result};
use replybox_api::{create_router, AppState};
use replybox_common::config::{Config, LoggingConfig};
use replybox_core::{FetchService, GmailProvider, Metrics, PgJobQueue, ReplyWorker};
use replybox_storage::{db::DatabasePool, EmailRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Jobs left in `processing` longer than this are assumed abandoned
const STALE_JOB_MINUTES: i64 = 15;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!(role = ?config.server.role, "Starting ReplyBox...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // The broker shares the main database unless BROKER_URL points elsewhere
    let broker_pool = if config.broker.is_separate(&config.database) {
        let pool = DatabasePool::new(&config.broker.database_config(&config.database)).await?;
        pool.migrate().await?;
        info!("Broker database connection established");
        pool
    } else {
        db_pool.clone()
    };

    let metrics = Arc::new(Metrics::new()?);
    let emails = Arc::new(EmailRepository::new(db_pool.clone()));
    let queue = Arc::new(PgJobQueue::new(
        broker_pool.clone(),
        config.broker.queue.clone(),
        config.worker.max_attempts,
    ));
    let provider = Arc::new(
        GmailProvider::from_config(&config.provider)
            .await
            .context("Failed to initialize mailbox provider")?,
    );

    let shutdown = CancellationToken::new();

    // Start reply worker
    let worker_handle = if config.server.role.runs_worker() {
        queue
            .requeue_stale(chrono::Duration::minutes(STALE_JOB_MINUTES))
            .await?;

        let worker = ReplyWorker::new(
            emails.clone(),
            queue.clone(),
            provider.clone(),
            metrics.clone(),
            config.worker.clone(),
        )
        .with_from_address(config.provider.from_address.clone());

        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            worker.run(shutdown).await;
        }))
    } else {
        info!("Reply worker disabled");
        None
    };

    // Start API server
    let api_handle = if config.server.role.runs_api() {
        let state = AppState {
            fetch: Arc::new(FetchService::new(
                provider.clone(),
                emails.clone(),
                metrics.clone(),
            )),
            emails: emails.clone(),
            queue: queue.clone(),
            metrics: metrics.clone(),
        };
        let app = create_router(state, &config.api);

        let addr = format!("{}:{}", config.server.bind_address, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server on {}", addr))?;
        info!("Starting API server on {}", addr);

        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                error!("API server error: {}", e);
            }
        }))
    } else {
        info!("API server disabled");
        None
    };

    info!("ReplyBox started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();

    for handle in [api_handle, worker_handle].into_iter().flatten() {
        if let Err(e) = handle.await {
            error!("Task ended abnormally: {}", e);
        }
    }

    if config.broker.is_separate(&config.database) {
        broker_pool.close().await;
    }
    db_pool.close().await;

    info!("ReplyBox shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info,replybox=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
