//! Port traits the domain and pipeline depend on, implemented by sr-adapters.

use chrono::{DateTime, Utc};
use sr_domain::{
    ActivityCategory, CertificateMetadata, CertificateOcrText, CertificateSubmission,
    ExtractedActivity, Student,
};
use thiserror::Error;

// ---------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------

/// Abstraction over wall-clock time, for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------
// ObjectStore (C1)
// ---------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("upload failed: {message}")]
    UploadFailed { message: String },
    #[error("object not found: {key}")]
    NotFound { key: String },
    #[error("download failed: {message}")]
    DownloadFailed { message: String },
    #[error("presign failed: {message}")]
    PresignFailed { message: String },
}

pub struct ObjectMetadata {
    pub enrollment_number: String,
    pub original_filename: String,
    pub checksum: String,
}

/// Content-addressed object storage, backed by an S3-compatible service.
pub trait ObjectStore: Send + Sync {
    fn upload(
        &self,
        key: &str,
        bytes: bytes::Bytes,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> impl std::future::Future<Output = Result<(), ObjectStoreError>> + Send;

    fn download(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bytes::Bytes, ObjectStoreError>> + Send;

    fn presigned_url(
        &self,
        key: &str,
        expires_in_secs: u64,
    ) -> impl std::future::Future<Output = Result<String, ObjectStoreError>> + Send;
}

// ---------------------------------------------------------------------
// MessageBus (C2)
// ---------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MessageBusError {
    #[error("connection error: {message}")]
    ConnectionError { message: String },
    #[error("publish failed: {message}")]
    PublishFailed { message: String },
    #[error("subscribe failed: {message}")]
    SubscribeFailed { message: String },
}

/// A message received off the bus. `ack`/`nak` advance or retry delivery;
/// per §5 the pipeline acks unconditionally after processing (effectively
/// at-most-once), but the trait exposes both for a hardened deployment.
///
/// `subscribe` returns these behind `Box<dyn ...>`, so unlike the other
/// ports here the futures are boxed explicitly rather than RPITIT, which
/// is not object-safe.
pub trait BusMessage: Send {
    fn payload(&self) -> &[u8];
    fn ack(self: Box<Self>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
    fn nak(self: Box<Self>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
}

pub trait MessageSubscription: Send {
    fn next(
        &mut self,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Option<Box<dyn BusMessage>>> + Send + '_>,
    >;
}

/// Durable, per-topic, per-consumer-group publish/subscribe, standing in
/// for a Kafka-compatible bus (§5, §6).
pub trait MessageBus: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), MessageBusError>> + Send;

    fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
    ) -> impl std::future::Future<Output = Result<Box<dyn MessageSubscription>, MessageBusError>> + Send;
}

// ---------------------------------------------------------------------
// OCR adapter (C4)
// ---------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("ocr backend error: {message}")]
    BackendError { message: String },
    #[error("unsupported file extension: {extension}")]
    UnsupportedExtension { extension: String },
}

pub struct OcrResult {
    pub text: String,
    pub confidence: f64,
}

/// Bytes -> (text, confidence), fanning a PDF out per page (§4.8).
pub trait OcrEngine: Send + Sync {
    fn process_file(
        &self,
        bytes: bytes::Bytes,
        extension: &str,
    ) -> impl std::future::Future<Output = Result<OcrResult, OcrError>> + Send;
}

// ---------------------------------------------------------------------
// LLM adapter (C5)
// ---------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm backend error: {message}")]
    BackendError { message: String },
}

/// The five Portuguese-named fields the extraction prompt returns,
/// carried verbatim per §6 (values are string or null).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ExtractedFields {
    pub nome_participante: Option<String>,
    pub evento: Option<String>,
    pub local: Option<String>,
    pub data: Option<String>,
    pub carga_horaria: Option<String>,
}

pub struct CategorizationResult {
    pub category_id: Option<i64>,
    pub reasoning: String,
}

/// Prompt execution with JSON/key-value fallback reply parsing (§4.9).
pub trait LlmProvider: Send + Sync {
    fn extract_fields(
        &self,
        raw_text: &str,
    ) -> impl std::future::Future<Output = Result<ExtractedFields, LlmError>> + Send;

    fn categorize_activity(
        &self,
        raw_text: &str,
        extracted: &ExtractedFields,
        categories_text: &str,
    ) -> impl std::future::Future<Output = Result<CategorizationResult, LlmError>> + Send;
}

// ---------------------------------------------------------------------
// Repositories (C3)
// ---------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {message}")]
    DatabaseError { message: String },
    #[error("not found")]
    NotFound,
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
}

pub trait StudentRepository: Send + Sync {
    fn create(
        &self,
        enrollment_number: &str,
        name: &str,
        email: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Student, RepositoryError>> + Send;

    fn get_by_enrollment_number(
        &self,
        enrollment_number: &str,
    ) -> impl std::future::Future<Output = Result<Option<Student>, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Student>, RepositoryError>> + Send;

    fn update(
        &self,
        enrollment_number: &str,
        name: Option<&str>,
        email: Option<Option<&str>>,
    ) -> impl std::future::Future<Output = Result<Student, RepositoryError>> + Send;

    /// Accrue approved hours; never called with a negative delta.
    fn add_approved_hours(
        &self,
        student_id: i64,
        delta: i64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

pub struct NewSubmission<'a> {
    pub student_id: i64,
    pub original_filename: &'a str,
    pub object_key: &'a str,
    pub file_checksum: &'a str,
    pub file_size: i64,
    pub mime_type: &'a str,
}

pub struct SubmissionFilter {
    pub status: Option<String>,
    pub enrollment_number: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

pub trait SubmissionRepository: Send + Sync {
    fn create(
        &self,
        new: NewSubmission<'_>,
    ) -> impl std::future::Future<Output = Result<CertificateSubmission, RepositoryError>> + Send;

    /// Insert with `status=uploaded` and transition to `queued` in a
    /// single transaction, per §4.1 step 6.
    fn create_queued(
        &self,
        new: NewSubmission<'_>,
    ) -> impl std::future::Future<Output = Result<CertificateSubmission, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<CertificateSubmission>, RepositoryError>> + Send;

    fn get_by_student_and_checksum(
        &self,
        student_id: i64,
        checksum: &str,
    ) -> impl std::future::Future<Output = Result<Option<CertificateSubmission>, RepositoryError>> + Send;

    fn update_status(
        &self,
        id: i64,
        status: &str,
        error_message: Option<&str>,
        update_processing_completed: bool,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn list_for_student(
        &self,
        student_id: i64,
        status: Option<&str>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<CertificateSubmission>, RepositoryError>> + Send;

    fn list_paginated(
        &self,
        filter: SubmissionFilter,
    ) -> impl std::future::Future<Output = Result<(Vec<CertificateSubmission>, u64), RepositoryError>> + Send;
}

pub trait OcrTextRepository: Send + Sync {
    fn create(
        &self,
        submission_id: i64,
        raw_text: &str,
        ocr_confidence: f64,
        processing_time_ms: i64,
    ) -> impl std::future::Future<Output = Result<CertificateOcrText, RepositoryError>> + Send;

    fn get_by_submission_id(
        &self,
        submission_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<CertificateOcrText>, RepositoryError>> + Send;
}

pub struct NewMetadata<'a> {
    pub submission_id: i64,
    pub participant_name: Option<&'a str>,
    pub event_name: Option<&'a str>,
    pub location: Option<&'a str>,
    pub event_date: Option<&'a str>,
    pub original_hours: Option<&'a str>,
    pub numeric_hours: Option<i64>,
    pub processing_time_ms: i64,
}

pub trait MetadataRepository: Send + Sync {
    fn create(
        &self,
        new: NewMetadata<'_>,
    ) -> impl std::future::Future<Output = Result<CertificateMetadata, RepositoryError>> + Send;

    fn get_by_submission_id(
        &self,
        submission_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<CertificateMetadata>, RepositoryError>> + Send;
}

pub trait CategoryRepository: Send + Sync {
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ActivityCategory>, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ActivityCategory>, RepositoryError>> + Send;
}

pub struct NewActivity<'a> {
    pub submission_id: i64,
    pub metadata_id: i64,
    pub student_id: i64,
    pub enrollment_number: &'a str,
    pub filename: &'a str,
    pub participant_name: Option<&'a str>,
    pub event_name: Option<&'a str>,
    pub location: Option<&'a str>,
    pub event_date: Option<&'a str>,
    pub original_hours: Option<&'a str>,
    pub numeric_hours: Option<i64>,
    pub category_id: Option<i64>,
    pub calculated_hours: Option<i64>,
    pub llm_reasoning: Option<&'a str>,
    pub raw_text: &'a str,
}

pub struct ApproveEffects {
    pub override_category_id: Option<i64>,
    pub override_hours: Option<i64>,
    pub override_reasoning: Option<String>,
    pub final_category_id: i64,
    pub final_hours: i64,
    pub coordinator_id: String,
}

pub trait ActivityRepository: Send + Sync {
    fn create(
        &self,
        new: NewActivity<'_>,
    ) -> impl std::future::Future<Output = Result<ExtractedActivity, RepositoryError>> + Send;

    fn get_by_submission_id(
        &self,
        submission_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ExtractedActivity>, RepositoryError>> + Send;

    /// Apply the approve effects to the activity row and accrue the
    /// student's hours, atomically with the submission status update.
    fn approve(
        &self,
        activity_id: i64,
        effects: ApproveEffects,
    ) -> impl std::future::Future<Output = Result<ExtractedActivity, RepositoryError>> + Send;

    fn reject(
        &self,
        activity_id: i64,
        reason: &str,
    ) -> impl std::future::Future<Output = Result<ExtractedActivity, RepositoryError>> + Send;

    fn list_for_student(
        &self,
        student_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ExtractedActivity>, RepositoryError>> + Send;
}
