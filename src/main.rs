mod config;
mod db;
mod domain;
mod error;
mod local_store;
mod middleware;
mod services;
mod state;
mod time_utils;
mod web;

use crate::config::Config;
use crate::db::{seed, PgGateway, SharedGateway};
use crate::local_store::LocalStore;
use crate::state::AppState;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    seed::seed_all(&pool, &config).await?;

    let store = LocalStore::open(&config.local_store_path).await;
    tracing::info!("Local store at {}", config.local_store_path);

    let gateway: SharedGateway = Arc::new(PgGateway::new(pool));
    let shared = AppState::new(&config, gateway, store);

    let scheduler = JobScheduler::new().await?;

    // Stale admin grants and idle rate-limit buckets - hourly
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                let now_ms = chrono::Utc::now().timestamp_millis();
                match state.admin_gate.purge_expired(now_ms).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!("Purged {} expired admin grants", purged),
                    Err(e) => tracing::error!("Failed to purge admin grants: {}", e),
                }
                state.login_limiter.cleanup().await;
                tracing::debug!("{} live sessions", state.sessions.active_count().await);
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: admin grant cleanup hourly");

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shared.sessions.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
