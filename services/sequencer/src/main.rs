use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use cadence_core::config::Config;
use cadence_core::health::health_router;
use cadence_core::tracing::init_tracing;

use cadence_sequencer::config::SequencerConfig;
use cadence_sequencer::state::AppState;
use cadence_sequencer::worker::Worker;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = SequencerConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let health_addr = format!("0.0.0.0:{}", config.health_port);
    let listener = tokio::net::TcpListener::bind(&health_addr)
        .await
        .expect("failed to bind");
    info!("sequencer health probes listening on {health_addr}");
    tokio::spawn(async move {
        axum::serve(listener, health_router())
            .await
            .expect("health server error");
    });

    if config.demo_mode {
        info!("demo mode: delays compressed, business hours ignored");
    }

    let state = AppState {
        db,
        redis,
        http: reqwest::Client::new(),
        config: Arc::new(config),
    };

    Worker::new(state).run(shutdown_signal()).await;
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
