//! Certificate submission intake (C7) and status lookup (C13), per §4.1
//! and §6.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sr_adapters::object_key;
use sr_domain::DomainError;
use sr_ports::{
    MessageBus, NewSubmission, ObjectMetadata, ObjectStore, StudentRepository,
    SubmissionRepository,
};
use tracing::{error, info, instrument, warn};

use crate::config::{ACCEPTED_EXTENSIONS, MAX_PAGE_SIZE, MAX_UPLOAD_BYTES};
use crate::handlers::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: i64,
    pub student_id: i64,
    pub original_filename: String,
    pub file_checksum: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
    pub error_message: Option<String>,
    pub submitted_at: String,
    pub processing_started_at: Option<String>,
    pub processing_completed_at: Option<String>,
    pub download_url: Option<String>,
}

pub(crate) async fn to_submission_response(
    state: &AppState,
    submission: sr_domain::CertificateSubmission,
) -> SubmissionResponse {
    let download_url = match state.object_store.presigned_url(&submission.object_key, 3600).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, submission_id = submission.id, "failed to presign download url");
            None
        }
    };

    SubmissionResponse {
        id: submission.id,
        student_id: submission.student_id,
        original_filename: submission.original_filename,
        file_checksum: submission.file_checksum,
        file_size: submission.file_size,
        mime_type: submission.mime_type,
        status: submission.status,
        error_message: submission.error_message,
        submitted_at: submission.submitted_at.to_rfc3339(),
        processing_started_at: submission.processing_started_at.map(|t| t.to_rfc3339()),
        processing_completed_at: submission.processing_completed_at.map(|t| t.to_rfc3339()),
        download_url,
    }
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit('.').next().map(|s| s.to_lowercase())
}

fn content_type_of(extension: &str) -> &'static str {
    sr_adapters::content_type_for_extension(extension)
}

/// POST /api/v1/certificate/submit
#[instrument(skip(state, multipart))]
pub async fn submit_certificate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(axum::http::StatusCode, Json<SubmissionResponse>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_filename: Option<String> = None;
    let mut enrollment_number: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest {
        message: format!("invalid multipart body: {e}"),
    })? {
        match field.name() {
            Some("file") => {
                original_filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| ApiError::BadRequest {
                    message: format!("failed to read file: {e}"),
                })?;
                if data.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::BadRequest {
                        message: format!(
                            "file exceeds maximum upload size of {MAX_UPLOAD_BYTES} bytes"
                        ),
                    });
                }
                file_bytes = Some(data.to_vec());
            }
            Some("enrollment_number") => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest {
                    message: format!("invalid enrollment_number field: {e}"),
                })?;
                enrollment_number = Some(text);
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::BadRequest {
        message: "missing file part".to_string(),
    })?;
    let original_filename = original_filename.ok_or_else(|| ApiError::BadRequest {
        message: "missing filename".to_string(),
    })?;
    let enrollment_number = enrollment_number.ok_or_else(|| ApiError::BadRequest {
        message: "missing enrollment_number field".to_string(),
    })?;

    let extension = extension_of(&original_filename).ok_or_else(|| ApiError::BadRequest {
        message: "file has no extension".to_string(),
    })?;
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest {
            message: format!("unsupported file extension: {extension}"),
        });
    }

    let student = state
        .students
        .get_by_enrollment_number(&enrollment_number)
        .await?
        .ok_or(DomainError::StudentNotFound { enrollment_number: enrollment_number.clone() })?;

    let checksum = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    };

    if let Some(existing) = state
        .submissions
        .get_by_student_and_checksum(student.id, &checksum)
        .await?
    {
        return Err(DomainError::DuplicateFile {
            existing_submission_id: existing.id,
            submitted_at: existing.submitted_at,
        }
        .into());
    }

    let key = object_key(&enrollment_number, &checksum, &extension);
    let content_type = content_type_of(&extension);
    let file_size = bytes.len() as i64;

    state
        .object_store
        .upload(
            &key,
            bytes::Bytes::from(bytes),
            content_type,
            ObjectMetadata {
                enrollment_number: enrollment_number.clone(),
                original_filename: original_filename.clone(),
                checksum: checksum.clone(),
            },
        )
        .await
        .map_err(|e| ApiError::BadRequest {
            message: format!("upload failed: {e}"),
        })?;

    let submission = state
        .submissions
        .create_queued(NewSubmission {
            student_id: student.id,
            original_filename: &original_filename,
            object_key: &key,
            file_checksum: &checksum,
            file_size,
            mime_type: content_type,
        })
        .await?;

    let payload = serde_json::json!({
        "submission_id": submission.id,
        "enrollment_number": enrollment_number,
        "object_key": key,
        "checksum": checksum,
        "original_filename": original_filename,
        "stage": "ingest",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if let Err(e) = state
        .message_bus
        .publish("certificate.ingest", &submission.id.to_string(), payload)
        .await
    {
        error!(error = %e, submission_id = submission.id, "failed to publish to processing queue");
        state
            .submissions
            .update_status(
                submission.id,
                "failed",
                Some("Failed to publish to processing queue"),
                false,
            )
            .await?;
        return Err(ApiError::QueueFailed {
            message: "Failed to publish to processing queue".to_string(),
        });
    }

    info!(submission_id = submission.id, "certificate submitted and queued");

    let submission = state
        .submissions
        .get_by_id(submission.id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: submission.id })?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(to_submission_response(&state, submission).await),
    ))
}

/// GET /api/v1/certificate/status/{id}
#[instrument(skip(state))]
pub async fn get_submission_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SubmissionResponse>> {
    let submission = state
        .submissions
        .get_by_id(id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: id })?;

    Ok(Json(to_submission_response(&state, submission).await))
}

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    MAX_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct ListSubmissionsResponse {
    pub submissions: Vec<SubmissionResponse>,
}

/// GET /api/v1/certificate/student/{enrollment_number}/submissions
#[instrument(skip(state))]
pub async fn list_student_submissions(
    State(state): State<AppState>,
    Path(enrollment_number): Path<String>,
    Query(query): Query<ListSubmissionsQuery>,
) -> ApiResult<Json<ListSubmissionsResponse>> {
    let student = state
        .students
        .get_by_enrollment_number(&enrollment_number)
        .await?
        .ok_or(DomainError::StudentNotFound { enrollment_number })?;

    let limit = query.limit.min(MAX_PAGE_SIZE);
    let submissions = state
        .submissions
        .list_for_student(student.id, query.status.as_deref(), limit)
        .await?;

    let mut responses = Vec::with_capacity(submissions.len());
    for submission in submissions {
        responses.push(to_submission_response(&state, submission).await);
    }

    Ok(Json(ListSubmissionsResponse { submissions: responses }))
}
