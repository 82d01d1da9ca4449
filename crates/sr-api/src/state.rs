//! Shared application state handed to every handler via `State<AppState>`.
//!
//! Each field is the one concrete adapter this service runs against;
//! ports are implemented generically (RPITIT), not as trait objects, so
//! state holds concrete adapter types rather than `Arc<dyn ...>`.

use sr_adapters::{
    NatsMessageBus, PostgresActivityRepository, PostgresCategoryRepository,
    PostgresMetadataRepository, PostgresOcrTextRepository, PostgresStudentRepository,
    PostgresSubmissionRepository, S3ObjectStore,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub students: Arc<PostgresStudentRepository>,
    pub submissions: Arc<PostgresSubmissionRepository>,
    pub ocr_text: Arc<PostgresOcrTextRepository>,
    pub metadata: Arc<PostgresMetadataRepository>,
    pub categories: Arc<PostgresCategoryRepository>,
    pub activities: Arc<PostgresActivityRepository>,
    pub object_store: Arc<S3ObjectStore>,
    pub message_bus: Arc<NatsMessageBus>,
}
