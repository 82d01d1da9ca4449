//! Consumer supervisor (C11): instantiates the three stage workers once
//! each, runs them on independent tasks, and coordinates shutdown.

mod config;

use axum::{routing::get, Json, Router};
use serde_json::json;
use sr_adapters::config::{LlmConfig, MessageBusConfig, ObjectStoreConfig, OcrConfig, PostgresConfig};
use sr_adapters::{
    HttpOcrEngine, NatsMessageBus, OllamaLlmProvider, PostgresActivityRepository,
    PostgresCategoryRepository, PostgresMetadataRepository, PostgresOcrTextRepository,
    PostgresStudentRepository, PostgresSubmissionRepository, S3ObjectStore,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SupervisorConfig;

struct SupervisorState {
    running: AtomicBool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SupervisorConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sr_supervisor={},sr_pipeline={}", config.log_level, config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting certificate pipeline consumer supervisor");

    let postgres_config = PostgresConfig::from_env();
    let pool =
        sr_adapters::postgres::connect(&postgres_config.url, postgres_config.max_connections).await?;

    let students = Arc::new(PostgresStudentRepository::new(pool.clone()));
    let submissions = Arc::new(PostgresSubmissionRepository::new(pool.clone()));
    let ocr_text = Arc::new(PostgresOcrTextRepository::new(pool.clone()));
    let metadata = Arc::new(PostgresMetadataRepository::new(pool.clone()));
    let categories = Arc::new(PostgresCategoryRepository::new(pool.clone()));
    let activities = Arc::new(PostgresActivityRepository::new(pool));

    let object_store = Arc::new(S3ObjectStore::connect(ObjectStoreConfig::from_env()).await?);
    let message_bus = Arc::new(NatsMessageBus::connect(MessageBusConfig::from_env()).await?);
    let ocr_engine = Arc::new(HttpOcrEngine::new(OcrConfig::from_env())?);
    let llm = Arc::new(OllamaLlmProvider::new(LlmConfig::from_env())?);

    let state = Arc::new(SupervisorState {
        running: AtomicBool::new(true),
    });
    let cancel = CancellationToken::new();

    let health_state = state.clone();
    let health_addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
    let health_app = Router::new().route(
        "/health",
        get(move || ready_handler(health_state.clone())),
    );
    let health_server = tokio::spawn(async move {
        info!(addr = %health_addr, "health server listening");
        if let Err(e) = axum::serve(
            tokio::net::TcpListener::bind(health_addr).await.unwrap(),
            health_app,
        )
        .await
        {
            error!(error = %e, "health server error");
        }
    });

    let ingest_handle = tokio::spawn({
        let submissions = submissions.clone();
        let object_store = object_store.clone();
        let ocr_engine = ocr_engine.clone();
        let ocr_text = ocr_text.clone();
        let message_bus = message_bus.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = sr_pipeline::run_ingest_worker(
                submissions,
                object_store,
                ocr_engine,
                ocr_text,
                message_bus,
                cancel,
            )
            .await
            {
                error!(error = %e, "ingest worker stopped");
            }
        }
    });

    let ocr_handle = tokio::spawn({
        let submissions = submissions.clone();
        let students = students.clone();
        let llm = llm.clone();
        let metadata = metadata.clone();
        let message_bus = message_bus.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) =
                sr_pipeline::run_ocr_worker(submissions, students, llm, metadata, message_bus, cancel)
                    .await
            {
                error!(error = %e, "ocr worker stopped");
            }
        }
    });

    let metadata_handle = tokio::spawn({
        let submissions = submissions.clone();
        let students = students.clone();
        let ocr_text = ocr_text.clone();
        let categories = categories.clone();
        let activities = activities.clone();
        let llm = llm.clone();
        let message_bus = message_bus.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = sr_pipeline::run_metadata_worker(
                submissions,
                students,
                ocr_text,
                categories,
                activities,
                llm,
                message_bus,
                cancel,
            )
            .await
            {
                error!(error = %e, "metadata worker stopped");
            }
        }
    });

    shutdown_signal().await;
    info!("shutdown signal received, stopping consumers");
    state.running.store(false, Ordering::Relaxed);
    cancel.cancel();

    let grace = config.shutdown_grace();
    let workers = async {
        let _ = tokio::join!(ingest_handle, ocr_handle, metadata_handle);
    };
    if tokio::time::timeout(grace, workers).await.is_err() {
        warn!("stage workers did not stop within the grace period, abandoning them");
    }
    health_server.abort();

    info!("supervisor shutdown complete");
    Ok(())
}

async fn ready_handler(state: Arc<SupervisorState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": if state.running.load(Ordering::Relaxed) { "ready" } else { "shutting_down" },
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
