//! API error taxonomy per §7: ValidationError, NotFound, Conflict,
//! AdapterFailure, InternalError map onto the HTTP status table in §6.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sr_domain::DomainError;
use sr_ports::RepositoryError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest { message: String },
    NotFound { resource: String, id: String },
    DuplicateSubmission { existing_submission_id: i64, submitted_at: String },
    QueueFailed { message: String },
    Internal { message: String },
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
            ApiError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                format!("{resource} not found: {id}"),
                None,
            ),
            ApiError::DuplicateSubmission {
                existing_submission_id,
                submitted_at,
            } => (
                StatusCode::CONFLICT,
                "A submission with this file already exists for this student".to_string(),
                Some(serde_json::json!({
                    "existing_submission_id": existing_submission_id,
                    "submitted_at": submitted_at,
                })),
            ),
            ApiError::QueueFailed { message } => {
                tracing::error!(error = %message, "failed to enqueue submission for processing");
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone(), None)
            }
            ApiError::Internal { message } => {
                tracing::error!(error = %message, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error,
            code: status.as_u16(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::StudentNotFound { enrollment_number } => ApiError::NotFound {
                resource: "Student".to_string(),
                id: enrollment_number,
            },
            DomainError::StudentAlreadyExists { enrollment_number } => ApiError::BadRequest {
                message: format!(
                    "Student with this enrollment number already exists: {enrollment_number}"
                ),
            },
            DomainError::DuplicateFile {
                existing_submission_id,
                submitted_at,
            } => ApiError::DuplicateSubmission {
                existing_submission_id,
                submitted_at: submitted_at.to_rfc3339(),
            },
            DomainError::SubmissionNotFound { submission_id } => ApiError::NotFound {
                resource: "Submission".to_string(),
                id: submission_id.to_string(),
            },
            DomainError::CategoryNotFound { category_id } => ApiError::BadRequest {
                message: format!("Category with ID {category_id} does not exist"),
            },
            DomainError::InvalidTransition { current, attempted } => ApiError::BadRequest {
                message: format!("cannot {attempted} from state {current}"),
            },
            DomainError::WrongStatusForApproval { status } => ApiError::BadRequest {
                message: format!("cannot approve submission with status: {status}"),
            },
            DomainError::WrongStatusForRejection { status } => ApiError::BadRequest {
                message: format!("cannot reject submission with status: {status}"),
            },
            DomainError::OverrideReasonRequired => ApiError::BadRequest {
                message: "override_reason is required when overriding hours or category"
                    .to_string(),
            },
            DomainError::RejectionReasonRequired => ApiError::BadRequest {
                message: "Rejection reason is required".to_string(),
            },
            DomainError::ValidationError { message } => ApiError::BadRequest { message },
            DomainError::ParticipantMismatch { .. } => ApiError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => ApiError::NotFound {
                resource: "resource".to_string(),
                id: "unknown".to_string(),
            },
            RepositoryError::UniqueViolation { constraint } => ApiError::BadRequest {
                message: format!("unique constraint violated: {constraint}"),
            },
            RepositoryError::DatabaseError { message } => ApiError::Internal { message },
        }
    }
}
