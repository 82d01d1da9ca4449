//! Domain error taxonomy per §7: kinds, not concrete adapter failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("student not found: {enrollment_number}")]
    StudentNotFound { enrollment_number: String },

    #[error("student with enrollment number {enrollment_number} already exists")]
    StudentAlreadyExists { enrollment_number: String },

    #[error("duplicate submission")]
    DuplicateFile {
        existing_submission_id: i64,
        submitted_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: i64 },

    #[error("category not found: {category_id}")]
    CategoryNotFound { category_id: i64 },

    #[error("invalid state transition: cannot go from {current} via {attempted}")]
    InvalidTransition { current: String, attempted: String },

    #[error("cannot approve submission with status: {status}")]
    WrongStatusForApproval { status: String },

    #[error("cannot reject submission with status: {status}")]
    WrongStatusForRejection { status: String },

    #[error("override_reason is required when overriding hours or category")]
    OverrideReasonRequired,

    #[error("rejection reason is required")]
    RejectionReasonRequired,

    #[error("{message}")]
    ValidationError { message: String },

    #[error("certificate participant '{extracted}' does not match student '{student}' who submitted the file")]
    ParticipantMismatch { extracted: String, student: String },
}
