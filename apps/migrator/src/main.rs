//! Migrator service
//!
//! Keeps the source and target stores of an online migration consistent:
//! validation runs publish inconsistency events, the fix consumer repairs
//! them, and the control API drives both along with the write pattern.

mod config;
mod entity;
mod logging;
mod pipeline;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use config::Config;
use entity::Interactive;
use migrator_api::{migrator_routes, MigratorState};
use migrator_core::WritePattern;
use migrator_engine::{FixConsumer, Scheduler};
use migrator_store::{DatabaseConfig, PgStore, Store};
use serde::Serialize;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        bind_addr = %config.bind_addr(),
        pattern = %config.pattern,
        batch_size = config.batch_size,
        kafka = config.kafka.is_some(),
        "Configuration loaded"
    );

    let source = connect_store("source", &config.source).await;
    let target = connect_store("target", &config.target).await;

    let fix_consumer = Arc::new(
        FixConsumer::new(Arc::clone(&source), Arc::clone(&target)).with_timeout(config.fix_timeout),
    );

    let pipeline_token = CancellationToken::new();
    let pipeline = match pipeline::start(&config, Arc::clone(&fix_consumer), pipeline_token.clone())
    {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Failed to start event pipeline");
            std::process::exit(1);
        }
    };

    let (pattern_tx, pattern_rx) = watch::channel(config.pattern);
    tokio::spawn(follow_pattern(pattern_rx));

    let scheduler = Arc::new(
        Scheduler::new(source, target, pipeline.producer, config.validator_config())
            .with_pattern(config.pattern)
            .with_listener(Arc::new(pattern_tx)),
    );

    let app = build_router(Arc::clone(&scheduler));

    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(a) => a,
        Err(e) => {
            error!(bind_addr = %config.bind_addr(), error = %e, "Invalid bind address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!(%addr, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    // Validation runs first, so nothing is published into a stopped pipeline.
    scheduler.shutdown().await;
    pipeline_token.cancel();
    if let Err(e) = pipeline.consumer.await {
        warn!(error = %e, "Fix consumer did not stop cleanly");
    }

    let stats = fix_consumer.stats();
    info!(
        fixed = stats.fixed,
        failed = stats.failed,
        malformed = stats.malformed,
        "Migrator stopped"
    );
}

/// Open one store, exiting when the database is unreachable.
async fn connect_store(name: &str, config: &DatabaseConfig) -> Arc<dyn Store<Interactive>> {
    match PgStore::<Interactive>::connect(name, config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(store = name, error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    }
}

/// Stand-in for the dual-write proxy: applies every pattern change it is told
/// about. Ends when the scheduler is dropped.
async fn follow_pattern(mut rx: watch::Receiver<WritePattern>) {
    while rx.changed().await.is_ok() {
        let pattern = *rx.borrow_and_update();
        info!(%pattern, "Dual-write pattern switched");
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn build_router(scheduler: Arc<Scheduler<Interactive>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/migrator", migrator_routes(MigratorState::new(scheduler)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
