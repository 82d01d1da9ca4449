//! Stage worker integration tests (C8-C10), run against in-memory fakes
//! of every port so the pipeline logic is exercised without a running
//! Postgres/S3/NATS stack.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::Utc;
use sr_domain::{ActivityCategory, CalculationType, CertificateOcrText, CertificateSubmission, Student};
use sr_ports::{
    ActivityRepository, ApproveEffects, BusMessage, CategorizationResult, CategoryRepository,
    ExtractedFields, LlmError, LlmProvider, MessageBus, MessageBusError, MessageSubscription,
    MetadataRepository, NewActivity, NewMetadata, NewSubmission, ObjectMetadata, ObjectStore,
    ObjectStoreError, OcrEngine, OcrError, OcrResult, OcrTextRepository, RepositoryError,
    StudentRepository, SubmissionFilter, SubmissionRepository,
};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------
// In-memory fakes
// ---------------------------------------------------------------------

struct FakeStudentRepository {
    students: Mutex<Vec<Student>>,
}

impl FakeStudentRepository {
    fn with_one(student: Student) -> Self {
        Self {
            students: Mutex::new(vec![student]),
        }
    }
}

impl StudentRepository for FakeStudentRepository {
    async fn create(&self, _: &str, _: &str, _: Option<&str>) -> Result<Student, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn get_by_enrollment_number(&self, enrollment_number: &str) -> Result<Option<Student>, RepositoryError> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.enrollment_number == enrollment_number)
            .cloned())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Student>, RepositoryError> {
        Ok(self.students.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn update(&self, _: &str, _: Option<&str>, _: Option<Option<&str>>) -> Result<Student, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn add_approved_hours(&self, student_id: i64, delta: i64) -> Result<(), RepositoryError> {
        let mut students = self.students.lock().unwrap();
        let student = students.iter_mut().find(|s| s.id == student_id).expect("student exists");
        student.total_approved_hours += delta;
        Ok(())
    }
}

struct FakeSubmissionRepository {
    submissions: Mutex<Vec<CertificateSubmission>>,
}

impl FakeSubmissionRepository {
    fn with_one(submission: CertificateSubmission) -> Self {
        Self {
            submissions: Mutex::new(vec![submission]),
        }
    }

    fn get(&self, id: i64) -> CertificateSubmission {
        self.submissions.lock().unwrap().iter().find(|s| s.id == id).cloned().unwrap()
    }
}

impl SubmissionRepository for FakeSubmissionRepository {
    async fn create(&self, _: NewSubmission<'_>) -> Result<CertificateSubmission, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn create_queued(&self, _: NewSubmission<'_>) -> Result<CertificateSubmission, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CertificateSubmission>, RepositoryError> {
        Ok(self.submissions.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn get_by_student_and_checksum(&self, _: i64, _: &str) -> Result<Option<CertificateSubmission>, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn update_status(
        &self,
        id: i64,
        status: &str,
        error_message: Option<&str>,
        update_processing_completed: bool,
    ) -> Result<(), RepositoryError> {
        let mut submissions = self.submissions.lock().unwrap();
        let submission = submissions.iter_mut().find(|s| s.id == id).expect("submission exists");
        submission.status = status.to_string();
        submission.error_message = error_message.map(|m| m.to_string());
        if update_processing_completed {
            submission.processing_completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_for_student(&self, _: i64, _: Option<&str>, _: u32) -> Result<Vec<CertificateSubmission>, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn list_paginated(&self, _: SubmissionFilter) -> Result<(Vec<CertificateSubmission>, u64), RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }
}

#[derive(Default)]
struct FakeObjectStore {
    fail_download: bool,
    bytes: Vec<u8>,
}

impl ObjectStore for FakeObjectStore {
    async fn upload(&self, _: &str, _: Bytes, _: &str, _: ObjectMetadata) -> Result<(), ObjectStoreError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn download(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        if self.fail_download {
            return Err(ObjectStoreError::NotFound { key: key.to_string() });
        }
        Ok(Bytes::from(self.bytes.clone()))
    }

    async fn presigned_url(&self, key: &str, _: u64) -> Result<String, ObjectStoreError> {
        Ok(format!("https://example.invalid/{key}"))
    }
}

struct FakeOcrEngine {
    result: OcrResult,
}

impl OcrEngine for FakeOcrEngine {
    async fn process_file(&self, _: Bytes, _: &str) -> Result<OcrResult, OcrError> {
        Ok(OcrResult {
            text: self.result.text.clone(),
            confidence: self.result.confidence,
        })
    }
}

struct FakeOcrTextRepository {
    rows: Mutex<Vec<CertificateOcrText>>,
    next_id: Mutex<i64>,
}

impl Default for FakeOcrTextRepository {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

impl OcrTextRepository for FakeOcrTextRepository {
    async fn create(
        &self,
        submission_id: i64,
        raw_text: &str,
        ocr_confidence: f64,
        processing_time_ms: i64,
    ) -> Result<CertificateOcrText, RepositoryError> {
        let mut next_id = self.next_id.lock().unwrap();
        let row = CertificateOcrText {
            id: *next_id,
            submission_id,
            raw_text: raw_text.to_string(),
            ocr_confidence,
            processing_time_ms,
            extracted_at: Utc::now(),
        };
        *next_id += 1;
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get_by_submission_id(&self, submission_id: i64) -> Result<Option<CertificateOcrText>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.submission_id == submission_id)
            .cloned())
    }
}

#[derive(Default)]
struct FakeMetadataRepository {
    created: Mutex<Vec<NewMetadataOwned>>,
}

struct NewMetadataOwned {
    submission_id: i64,
    participant_name: Option<String>,
}

impl MetadataRepository for FakeMetadataRepository {
    async fn create(&self, new: NewMetadata<'_>) -> Result<sr_domain::CertificateMetadata, RepositoryError> {
        self.created.lock().unwrap().push(NewMetadataOwned {
            submission_id: new.submission_id,
            participant_name: new.participant_name.map(|s| s.to_string()),
        });
        Ok(sr_domain::CertificateMetadata {
            id: 1,
            submission_id: new.submission_id,
            participant_name: new.participant_name.map(|s| s.to_string()),
            event_name: new.event_name.map(|s| s.to_string()),
            location: new.location.map(|s| s.to_string()),
            event_date: new.event_date.map(|s| s.to_string()),
            original_hours: new.original_hours.map(|s| s.to_string()),
            numeric_hours: new.numeric_hours,
            extraction_method: "llm".to_string(),
            extraction_confidence: None,
            processing_time_ms: new.processing_time_ms,
            extracted_at: Utc::now(),
        })
    }

    async fn get_by_submission_id(&self, _: i64) -> Result<Option<sr_domain::CertificateMetadata>, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }
}

struct FakeCategoryRepository {
    categories: Vec<ActivityCategory>,
}

impl CategoryRepository for FakeCategoryRepository {
    async fn list_all(&self) -> Result<Vec<ActivityCategory>, RepositoryError> {
        Ok(self.categories.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ActivityCategory>, RepositoryError> {
        Ok(self.categories.iter().find(|c| c.id == id).cloned())
    }
}

#[derive(Default)]
struct FakeActivityRepository {
    created: Mutex<Vec<i64>>,
}

impl ActivityRepository for FakeActivityRepository {
    async fn create(&self, new: NewActivity<'_>) -> Result<sr_domain::ExtractedActivity, RepositoryError> {
        self.created.lock().unwrap().push(new.submission_id);
        Ok(sr_domain::ExtractedActivity {
            id: 1,
            submission_id: new.submission_id,
            metadata_id: new.metadata_id,
            student_id: new.student_id,
            enrollment_number: new.enrollment_number.to_string(),
            filename: new.filename.to_string(),
            participant_name: new.participant_name.map(|s| s.to_string()),
            event_name: new.event_name.map(|s| s.to_string()),
            location: new.location.map(|s| s.to_string()),
            event_date: new.event_date.map(|s| s.to_string()),
            original_hours: new.original_hours.map(|s| s.to_string()),
            numeric_hours: new.numeric_hours,
            category_id: new.category_id,
            calculated_hours: new.calculated_hours,
            llm_reasoning: new.llm_reasoning.map(|s| s.to_string()),
            raw_text: new.raw_text.to_string(),
            review_status: "pending_review".to_string(),
            coordinator_id: None,
            coordinator_comments: None,
            reviewed_at: None,
            override_category_id: None,
            override_hours: None,
            override_reasoning: None,
            final_category_id: None,
            final_hours: None,
            processed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn get_by_submission_id(&self, _: i64) -> Result<Option<sr_domain::ExtractedActivity>, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn approve(&self, _: i64, _: ApproveEffects) -> Result<sr_domain::ExtractedActivity, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn reject(&self, _: i64, _: &str) -> Result<sr_domain::ExtractedActivity, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }

    async fn list_for_student(&self, _: i64) -> Result<Vec<sr_domain::ExtractedActivity>, RepositoryError> {
        unimplemented!("not exercised by stage workers")
    }
}

struct FakeLlmProvider {
    fields: ExtractedFields,
    category_id: Option<i64>,
}

impl LlmProvider for FakeLlmProvider {
    async fn extract_fields(&self, _: &str) -> Result<ExtractedFields, LlmError> {
        Ok(self.fields.clone())
    }

    async fn categorize_activity(&self, _: &str, _: &ExtractedFields, _: &str) -> Result<CategorizationResult, LlmError> {
        Ok(CategorizationResult {
            category_id: self.category_id,
            reasoning: "matches the course-workshop category".to_string(),
        })
    }
}

struct FakeBusMessage {
    payload: Vec<u8>,
}

impl BusMessage for FakeBusMessage {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn ack(self: Box<Self>) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async {})
    }

    fn nak(self: Box<Self>) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}

struct FakeSubscription {
    queue: VecDeque<Vec<u8>>,
}

impl MessageSubscription for FakeSubscription {
    fn next(
        &mut self,
    ) -> Pin<Box<dyn std::future::Future<Output = Option<Box<dyn BusMessage>>> + Send + '_>> {
        Box::pin(async move {
            self.queue.pop_front().map(|payload| Box::new(FakeBusMessage { payload }) as Box<dyn BusMessage>)
        })
    }
}

#[derive(Default)]
struct FakeMessageBus {
    incoming: Mutex<Vec<u8>>,
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeMessageBus {
    fn with_incoming(payload: serde_json::Value) -> Self {
        Self {
            incoming: Mutex::new(serde_json::to_vec(&payload).unwrap()),
            published: Mutex::new(Vec::new()),
        }
    }
}

impl MessageBus for FakeMessageBus {
    async fn publish(&self, topic: &str, _key: &str, payload: serde_json::Value) -> Result<(), MessageBusError> {
        self.published.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, _topic: &str, _consumer_group: &str) -> Result<Box<dyn MessageSubscription>, MessageBusError> {
        let mut queue = VecDeque::new();
        queue.push_back(self.incoming.lock().unwrap().clone());
        Ok(Box::new(FakeSubscription { queue }))
    }
}

fn test_student(id: i64, name: &str) -> Student {
    Student {
        id,
        enrollment_number: "2024001".to_string(),
        name: name.to_string(),
        email: None,
        total_approved_hours: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_submission(id: i64, student_id: i64, status: &str) -> CertificateSubmission {
    CertificateSubmission {
        id,
        student_id,
        original_filename: "certificate.pdf".to_string(),
        object_key: "certificates/2024001/abc.pdf".to_string(),
        file_checksum: "abc".to_string(),
        file_size: 1024,
        mime_type: "application/pdf".to_string(),
        status: status.to_string(),
        error_message: None,
        submitted_at: Utc::now(),
        processing_started_at: None,
        processing_completed_at: None,
    }
}

fn test_category(id: i64, calc: CalculationType) -> ActivityCategory {
    ActivityCategory {
        id,
        name: "Workshop".to_string(),
        description: Some("Short workshops".to_string()),
        calculation_type: calc,
        hours_awarded: None,
        input_unit: Some("hours".to_string()),
        input_quantity: Some(1),
        output_hours: Some(1),
        max_total_hours: 40,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------
// Ingest worker
// ---------------------------------------------------------------------

#[tokio::test]
async fn ingest_worker_persists_ocr_text_and_publishes_next_stage() {
    let submissions = Arc::new(FakeSubmissionRepository::with_one(test_submission(1, 10, "queued")));
    let object_store = Arc::new(FakeObjectStore {
        fail_download: false,
        bytes: b"%PDF-1.4 certificate bytes".to_vec(),
    });
    let ocr_engine = Arc::new(FakeOcrEngine {
        result: OcrResult {
            text: "Certificado de Participacao".to_string(),
            confidence: 95.0,
        },
    });
    let ocr_text = Arc::new(FakeOcrTextRepository::default());
    let message_bus = Arc::new(FakeMessageBus::with_incoming(serde_json::json!({
        "submission_id": 1,
        "original_filename": "certificate.pdf",
    })));

    sr_pipeline::run_ingest_worker(
        submissions.clone(),
        object_store,
        ocr_engine,
        ocr_text.clone(),
        message_bus.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(submissions.get(1).status, "ocr_processing");
    let stored = ocr_text.get_by_submission_id(1).await.unwrap().unwrap();
    assert_eq!(stored.raw_text, "Certificado de Participacao");

    let published = message_bus.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "certificate.ocr");
    assert_eq!(published[0].1["submission_id"], 1);
}

#[tokio::test]
async fn ingest_worker_marks_submission_failed_when_download_fails() {
    let submissions = Arc::new(FakeSubmissionRepository::with_one(test_submission(1, 10, "queued")));
    let object_store = Arc::new(FakeObjectStore {
        fail_download: true,
        bytes: Vec::new(),
    });
    let ocr_engine = Arc::new(FakeOcrEngine {
        result: OcrResult { text: String::new(), confidence: 0.0 },
    });
    let ocr_text = Arc::new(FakeOcrTextRepository::default());
    let message_bus = Arc::new(FakeMessageBus::with_incoming(serde_json::json!({
        "submission_id": 1,
        "original_filename": "certificate.pdf",
    })));

    sr_pipeline::run_ingest_worker(
        submissions.clone(),
        object_store,
        ocr_engine,
        ocr_text,
        message_bus.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let submission = submissions.get(1);
    assert_eq!(submission.status, "failed");
    assert!(submission.error_message.unwrap().contains("download"));
    assert!(message_bus.published.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------
// OCR worker
// ---------------------------------------------------------------------

#[tokio::test]
async fn ocr_worker_publishes_metadata_stage_when_name_matches() {
    let submissions = Arc::new(FakeSubmissionRepository::with_one(test_submission(1, 10, "ocr_processing")));
    let students = Arc::new(FakeStudentRepository::with_one(test_student(10, "Ada Lovelace")));
    let llm = Arc::new(FakeLlmProvider {
        fields: ExtractedFields {
            nome_participante: Some("Ada Lovelace".to_string()),
            evento: Some("Workshop de Rust".to_string()),
            local: Some("Online".to_string()),
            data: Some("2026-01-10".to_string()),
            carga_horaria: Some("8 horas".to_string()),
        },
        category_id: None,
    });
    let metadata = Arc::new(FakeMetadataRepository::default());
    let message_bus = Arc::new(FakeMessageBus::with_incoming(serde_json::json!({
        "submission_id": 1,
        "raw_text": "Certificado de Participacao",
    })));

    sr_pipeline::run_ocr_worker(
        submissions.clone(),
        students,
        llm,
        metadata.clone(),
        message_bus.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(submissions.get(1).status, "metadata_processing");
    assert_eq!(metadata.created.lock().unwrap().len(), 1);

    let published = message_bus.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "certificate.metadata");
}

#[tokio::test]
async fn ocr_worker_fails_submission_on_participant_name_mismatch() {
    let submissions = Arc::new(FakeSubmissionRepository::with_one(test_submission(1, 10, "ocr_processing")));
    let students = Arc::new(FakeStudentRepository::with_one(test_student(10, "Ada Lovelace")));
    let llm = Arc::new(FakeLlmProvider {
        fields: ExtractedFields {
            nome_participante: Some("Someone Else Entirely".to_string()),
            evento: Some("Workshop de Rust".to_string()),
            local: None,
            data: None,
            carga_horaria: None,
        },
        category_id: None,
    });
    let metadata = Arc::new(FakeMetadataRepository::default());
    let message_bus = Arc::new(FakeMessageBus::with_incoming(serde_json::json!({
        "submission_id": 1,
        "raw_text": "Certificado de Participacao",
    })));

    sr_pipeline::run_ocr_worker(
        submissions.clone(),
        students,
        llm,
        metadata,
        message_bus.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let submission = submissions.get(1);
    assert_eq!(submission.status, "failed");
    assert!(submission.error_message.unwrap().to_lowercase().contains("participant"));
    assert!(message_bus.published.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------
// Metadata worker
// ---------------------------------------------------------------------

#[tokio::test]
async fn metadata_worker_calculates_hours_and_moves_to_pending_review() {
    let submissions = Arc::new(FakeSubmissionRepository::with_one(test_submission(1, 10, "metadata_processing")));
    let students = Arc::new(FakeStudentRepository::with_one(test_student(10, "Ada Lovelace")));
    let ocr_text = Arc::new(FakeOcrTextRepository::default());
    ocr_text.create(1, "Certificado de Participacao", 95.0, 100).await.unwrap();
    let categories = Arc::new(FakeCategoryRepository {
        categories: vec![test_category(7, CalculationType::RatioHours)],
    });
    let activities = Arc::new(FakeActivityRepository::default());
    let llm = Arc::new(FakeLlmProvider {
        fields: ExtractedFields::default(),
        category_id: Some(7),
    });
    let message_bus = Arc::new(FakeMessageBus::with_incoming(serde_json::json!({
        "submission_id": 1,
        "metadata_id": 1,
        "extracted_data": {
            "nome_participante": "Ada Lovelace",
            "evento": "Workshop de Rust",
            "local": "Online",
            "data": "2026-01-10",
            "carga_horaria": "8 horas",
        },
    })));

    sr_pipeline::run_metadata_worker(
        submissions.clone(),
        students,
        ocr_text,
        categories,
        activities.clone(),
        llm,
        message_bus,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(submissions.get(1).status, "pending_review");
    assert_eq!(activities.created.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn metadata_worker_fails_submission_when_llm_category_is_not_in_catalog() {
    let submissions = Arc::new(FakeSubmissionRepository::with_one(test_submission(1, 10, "metadata_processing")));
    let students = Arc::new(FakeStudentRepository::with_one(test_student(10, "Ada Lovelace")));
    let ocr_text = Arc::new(FakeOcrTextRepository::default());
    ocr_text.create(1, "Certificado de Participacao", 95.0, 100).await.unwrap();
    let categories = Arc::new(FakeCategoryRepository {
        categories: vec![test_category(7, CalculationType::RatioHours)],
    });
    let activities = Arc::new(FakeActivityRepository::default());
    let llm = Arc::new(FakeLlmProvider {
        fields: ExtractedFields::default(),
        category_id: Some(999),
    });
    let message_bus = Arc::new(FakeMessageBus::with_incoming(serde_json::json!({
        "submission_id": 1,
        "metadata_id": 1,
        "extracted_data": {
            "nome_participante": "Ada Lovelace",
            "evento": "Workshop de Rust",
            "local": "Online",
            "data": "2026-01-10",
            "carga_horaria": "8 horas",
        },
    })));

    sr_pipeline::run_metadata_worker(
        submissions.clone(),
        students,
        ocr_text,
        categories,
        activities.clone(),
        llm,
        message_bus,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(submissions.get(1).status, "failed");
    assert!(activities.created.lock().unwrap().is_empty());
}
