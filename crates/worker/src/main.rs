use std::sync::Arc;
use std::time::Duration;

use codevoice_db::store::{PgTaskStore, TaskStore};
use codevoice_events::{connect_broker, BrokerConfig, Notifier};
use codevoice_worker::{build_generator, GenerationWorker, GeneratorConfig, WorkerConfig};
use tokio_util::sync::CancellationToken;

/// Time allowed for in-flight tasks after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(150);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    codevoice_worker::telemetry::init_tracing("codevoice_worker=debug");

    // --- Configuration ---
    let worker_config = WorkerConfig::from_env().expect("Invalid worker configuration");
    let generator_config = GeneratorConfig::from_env().expect("Invalid generator configuration");
    let broker_config = BrokerConfig::from_env().expect("Invalid broker configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = codevoice_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    codevoice_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    let store: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(pool));

    // --- Broker & generator ---
    let notifier = Notifier::new(connect_broker(&broker_config).await);
    let generator = build_generator(&generator_config).expect("Failed to build generator");
    tracing::info!(generator = generator.name(), "Generator configured");

    // --- Run ---
    let worker = Arc::new(GenerationWorker::new(
        store,
        generator,
        notifier,
        worker_config,
    ));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&worker).run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
        tracing::warn!("In-flight tasks did not finish before the drain timeout");
    }
    tracing::info!("Worker shut down");
}

/// Wait for SIGINT or SIGTERM.
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
        () = ctrl_c => tracing::info!("Received SIGINT, stopping worker"),
        () = terminate => tracing::info!("Received SIGTERM, stopping worker"),
    }
}
