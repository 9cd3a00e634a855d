use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use codevoice_api::background::task_retention::{self, RetentionPolicy};
use codevoice_api::config::{ServerConfig, StoreBackend};
use codevoice_api::router::build_app_router;
use codevoice_api::state::AppState;
use codevoice_api::ws;
use codevoice_db::store::{InMemoryTaskStore, PgTaskStore, TaskStore};
use codevoice_events::{connect_broker, BrokerConfig, Notifier};
use codevoice_worker::{
    build_generator, GenerationWorker, GeneratorConfig, Metrics, WorkerConfig,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    codevoice_worker::telemetry::init_tracing(
        "codevoice_api=debug,codevoice_worker=debug,tower_http=debug",
    );

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    let broker_config = BrokerConfig::from_env().expect("Invalid broker configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Task store ---
    let store: Arc<dyn TaskStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");
            let pool = codevoice_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            codevoice_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            codevoice_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database ready, migrations applied");
            Arc::new(PgTaskStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory task store; tasks are lost on restart");
            Arc::new(InMemoryTaskStore::new())
        }
    };

    // --- Broker ---
    let notifier = Notifier::new(connect_broker(&broker_config).await);

    // --- Metrics ---
    let metrics = Arc::new(Metrics::new().expect("Failed to register metrics"));

    // --- Background services ---
    let cancel = CancellationToken::new();
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), cancel.clone());

    let retention_handle = tokio::spawn(task_retention::run(
        Arc::clone(&store),
        notifier.clone(),
        RetentionPolicy::new(config.task_retention_hours, config.stale_task_minutes),
        cancel.clone(),
    ));

    let worker_signal = Arc::new(Notify::new());
    let worker_handle = if config.embedded_worker {
        start_embedded_worker(&store, &notifier, &worker_signal, &metrics, &cancel)
    } else {
        tracing::info!("Embedded worker disabled; run codevoice-worker separately");
        None
    };

    // --- App state & router ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        notifier,
        worker_signal,
        metrics,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if let Some(handle) = worker_handle {
        if tokio::time::timeout(drain, handle).await.is_err() {
            tracing::warn!("Embedded worker did not drain before the shutdown timeout");
        }
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), heartbeat_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Start the in-process worker, sharing the enqueue wakeup signal.
///
/// Without generator credentials the worker is skipped and tasks stay
/// queued until a standalone worker picks them up.
fn start_embedded_worker(
    store: &Arc<dyn TaskStore>,
    notifier: &Notifier,
    worker_signal: &Arc<Notify>,
    metrics: &Arc<Metrics>,
    cancel: &CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    let worker_config = WorkerConfig::from_env().expect("Invalid worker configuration");
    let generator_config = GeneratorConfig::from_env().expect("Invalid generator configuration");

    let generator = match build_generator(&generator_config) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::error!(error = %e, "Embedded worker not started");
            return None;
        }
    };

    let worker = Arc::new(
        GenerationWorker::new(Arc::clone(store), generator, notifier.clone(), worker_config)
            .with_wakeup(Arc::clone(worker_signal))
            .with_metrics(Arc::clone(metrics)),
    );
    Some(tokio::spawn(worker.run(cancel.clone())))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
