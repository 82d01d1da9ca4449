//! HTTP API entry point: builds the adapter stack, wires it into
//! `AppState`, and serves the certificate submission and review routes.

mod config;
mod handlers;
mod state;

use axum::{
    routing::{get, post},
    Router,
};
use sr_adapters::{
    config::{MessageBusConfig, ObjectStoreConfig, PostgresConfig},
    NatsMessageBus, PostgresActivityRepository, PostgresCategoryRepository,
    PostgresMetadataRepository, PostgresOcrTextRepository, PostgresStudentRepository,
    PostgresSubmissionRepository, S3ObjectStore,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ApiConfig;
use crate::state::AppState;

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/v1/student/register",
            post(handlers::student::register_student),
        )
        .route(
            "/api/v1/student/:enrollment_number",
            get(handlers::student::get_student).put(handlers::student::update_student),
        )
        .route(
            "/api/v1/student/:enrollment_number/activities",
            get(handlers::activities::list_student_activities),
        )
        .route(
            "/api/v1/certificate/submit",
            post(handlers::certificate::submit_certificate),
        )
        .route(
            "/api/v1/certificate/status/:id",
            get(handlers::certificate::get_submission_status),
        )
        .route(
            "/api/v1/certificate/student/:enrollment_number/submissions",
            get(handlers::certificate::list_student_submissions),
        )
        .route(
            "/api/v1/coordinator/pending",
            get(handlers::coordinator::list_pending),
        )
        .route(
            "/api/v1/coordinator/submission/:id",
            get(handlers::coordinator::get_submission_detail),
        )
        .route(
            "/api/v1/coordinator/approve/:id",
            post(handlers::coordinator::approve_submission),
        )
        .route(
            "/api/v1/coordinator/reject/:id",
            post(handlers::coordinator::reject_submission),
        )
        .route("/api/v1/categories", get(handlers::categories::list_categories))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sr_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_config = ApiConfig::from_env();

    let postgres_config = PostgresConfig::from_env();
    let pool = sr_adapters::postgres::connect(&postgres_config.url, postgres_config.max_connections)
        .await
        .expect("failed to connect to postgres");

    let object_store = S3ObjectStore::connect(ObjectStoreConfig::from_env())
        .await
        .expect("failed to connect to object store");

    let message_bus = NatsMessageBus::connect(MessageBusConfig::from_env())
        .await
        .expect("failed to connect to message bus");

    let state = AppState {
        students: Arc::new(PostgresStudentRepository::new(pool.clone())),
        submissions: Arc::new(PostgresSubmissionRepository::new(pool.clone())),
        ocr_text: Arc::new(PostgresOcrTextRepository::new(pool.clone())),
        metadata: Arc::new(PostgresMetadataRepository::new(pool.clone())),
        categories: Arc::new(PostgresCategoryRepository::new(pool.clone())),
        activities: Arc::new(PostgresActivityRepository::new(pool)),
        object_store: Arc::new(object_store),
        message_bus: Arc::new(message_bus),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(api_config.bind_addr())
        .await
        .expect("failed to bind to configured address");

    tracing::info!(addr = %api_config.bind_addr(), "certificate pipeline API listening");

    axum::serve(listener, app).await.expect("server failed");
}
