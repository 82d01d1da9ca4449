//! Coordinator review surface (C12): list pending submissions, view a
//! full detail record, approve or reject a reviewed activity (§4.7).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sr_domain::{state_machine::transition, DomainError, SubmissionEvent, SubmissionState};
use sr_ports::{
    ActivityRepository, ApproveEffects, CategoryRepository, MetadataRepository,
    OcrTextRepository, StudentRepository, SubmissionFilter, SubmissionRepository,
};
use tracing::instrument;

use crate::config::MAX_PAGE_SIZE;
use crate::handlers::certificate::SubmissionResponse;
use crate::handlers::student::StudentResponse;
use crate::handlers::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub enrollment: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    MAX_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct PendingSubmissionsResponse {
    pub submissions: Vec<SubmissionDetailResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// GET /api/v1/coordinator/pending
#[instrument(skip(state))]
pub async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<PendingSubmissionsResponse>> {
    let page = query.page.max(1);
    let per_page = query.per_page.min(MAX_PAGE_SIZE).max(1);

    let (submissions, total) = state
        .submissions
        .list_paginated(SubmissionFilter {
            status: Some("pending_review".to_string()),
            enrollment_number: query.enrollment,
            page,
            per_page,
        })
        .await?;

    let mut rows = Vec::with_capacity(submissions.len());
    for submission in submissions {
        rows.push(build_detail_row(&state, submission).await?);
    }

    Ok(Json(PendingSubmissionsResponse {
        submissions: rows,
        total,
        page,
        per_page,
    }))
}

#[derive(Debug, Serialize)]
pub struct SubmissionDetailResponse {
    pub submission: SubmissionResponse,
    pub student: StudentResponse,
    pub raw_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub metadata: Option<MetadataResponse>,
    pub activity: Option<ActivityResponse>,
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub participant_name: Option<String>,
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub event_date: Option<String>,
    pub original_hours: Option<String>,
    pub numeric_hours: Option<i64>,
}

impl From<sr_domain::CertificateMetadata> for MetadataResponse {
    fn from(m: sr_domain::CertificateMetadata) -> Self {
        Self {
            participant_name: m.participant_name,
            event_name: m.event_name,
            location: m.location,
            event_date: m.event_date,
            original_hours: m.original_hours,
            numeric_hours: m.numeric_hours,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: i64,
    pub participant_name: Option<String>,
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub event_date: Option<String>,
    pub original_hours: Option<String>,
    pub numeric_hours: Option<i64>,
    pub category_id: Option<i64>,
    pub calculated_hours: Option<i64>,
    pub llm_reasoning: Option<String>,
    pub review_status: String,
    pub coordinator_id: Option<String>,
    pub coordinator_comments: Option<String>,
    pub reviewed_at: Option<String>,
    pub override_category_id: Option<i64>,
    pub override_hours: Option<i64>,
    pub override_reasoning: Option<String>,
    pub final_category_id: Option<i64>,
    pub final_hours: Option<i64>,
}

impl From<sr_domain::ExtractedActivity> for ActivityResponse {
    fn from(a: sr_domain::ExtractedActivity) -> Self {
        Self {
            id: a.id,
            participant_name: a.participant_name,
            event_name: a.event_name,
            location: a.location,
            event_date: a.event_date,
            original_hours: a.original_hours,
            numeric_hours: a.numeric_hours,
            category_id: a.category_id,
            calculated_hours: a.calculated_hours,
            llm_reasoning: a.llm_reasoning,
            review_status: a.review_status,
            coordinator_id: a.coordinator_id,
            coordinator_comments: a.coordinator_comments,
            reviewed_at: a.reviewed_at.map(|t| t.to_rfc3339()),
            override_category_id: a.override_category_id,
            override_hours: a.override_hours,
            override_reasoning: a.override_reasoning,
            final_category_id: a.final_category_id,
            final_hours: a.final_hours,
        }
    }
}

async fn build_detail_row(
    state: &AppState,
    submission: sr_domain::CertificateSubmission,
) -> ApiResult<SubmissionDetailResponse> {
    let submission_id = submission.id;

    let student = state
        .students
        .get_by_id(submission.student_id)
        .await?
        .ok_or(DomainError::StudentNotFound {
            enrollment_number: submission.student_id.to_string(),
        })?;

    let ocr_text = state.ocr_text.get_by_submission_id(submission_id).await?;
    let metadata = state.metadata.get_by_submission_id(submission_id).await?;
    let activity = state.activities.get_by_submission_id(submission_id).await?;

    let submission_response =
        crate::handlers::certificate::to_submission_response(state, submission).await;

    Ok(SubmissionDetailResponse {
        submission: submission_response,
        student: student.into(),
        raw_text: ocr_text.as_ref().map(|t| t.raw_text.clone()),
        ocr_confidence: ocr_text.map(|t| t.ocr_confidence),
        metadata: metadata.map(MetadataResponse::from),
        activity: activity.map(ActivityResponse::from),
    })
}

/// GET /api/v1/coordinator/submission/{id}
#[instrument(skip(state))]
pub async fn get_submission_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SubmissionDetailResponse>> {
    let submission = state
        .submissions
        .get_by_id(id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: id })?;

    Ok(Json(build_detail_row(&state, submission).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct ApproveRequest {
    #[serde(default)]
    pub final_hours: Option<i64>,
    #[serde(default)]
    pub final_category_id: Option<i64>,
    #[serde(default)]
    pub override_reason: Option<String>,
}

/// POST /api/v1/coordinator/approve/{id}
#[instrument(skip(state, body))]
pub async fn approve_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<ApproveRequest>>,
) -> ApiResult<Json<ActivityResponse>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let submission = state
        .submissions
        .get_by_id(id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: id })?;

    let current_state = SubmissionState::from_str(&submission.status)
        .ok_or_else(|| DomainError::WrongStatusForApproval { status: submission.status.clone() })?;
    if transition(current_state, SubmissionEvent::Approve).is_err() {
        return Err(DomainError::WrongStatusForApproval { status: submission.status }.into());
    }

    let activity = state
        .activities
        .get_by_submission_id(id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: id })?;

    let overriding_category = body.final_category_id.is_some_and(|c| Some(c) != activity.category_id);
    let overriding_hours = body.final_hours.is_some_and(|h| Some(h) != activity.calculated_hours);

    if (overriding_category || overriding_hours) && body.override_reason.is_none() {
        return Err(DomainError::OverrideReasonRequired.into());
    }

    let final_category_id = body
        .final_category_id
        .or(activity.category_id)
        .ok_or(DomainError::ValidationError {
            message: "activity has no category to approve".to_string(),
        })?;

    if state.categories.get_by_id(final_category_id).await?.is_none() {
        return Err(DomainError::CategoryNotFound { category_id: final_category_id }.into());
    }

    let final_hours = body
        .final_hours
        .or(activity.calculated_hours)
        .ok_or(DomainError::ValidationError {
            message: "activity has no calculated hours to approve".to_string(),
        })?;

    if final_hours < 0 {
        return Err(DomainError::ValidationError {
            message: "final_hours cannot be negative".to_string(),
        }
        .into());
    }

    let approved = state
        .activities
        .approve(
            activity.id,
            ApproveEffects {
                override_category_id: overriding_category.then_some(final_category_id),
                override_hours: overriding_hours.then_some(final_hours),
                override_reasoning: body.override_reason,
                final_category_id,
                final_hours,
                coordinator_id: "coordinator".to_string(),
            },
        )
        .await?;

    Ok(Json(approved.into()))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// POST /api/v1/coordinator/reject/{id}
#[instrument(skip(state, body))]
pub async fn reject_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<Json<ActivityResponse>> {
    if body.reason.trim().is_empty() {
        return Err(DomainError::RejectionReasonRequired.into());
    }

    let submission = state
        .submissions
        .get_by_id(id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: id })?;

    let current_state = SubmissionState::from_str(&submission.status)
        .ok_or_else(|| DomainError::WrongStatusForRejection { status: submission.status.clone() })?;
    if transition(current_state, SubmissionEvent::Reject).is_err() {
        return Err(DomainError::WrongStatusForRejection { status: submission.status }.into());
    }

    let activity = state
        .activities
        .get_by_submission_id(id)
        .await?
        .ok_or(DomainError::SubmissionNotFound { submission_id: id })?;

    let rejected = state.activities.reject(activity.id, &body.reason).await?;

    Ok(Json(rejected.into()))
}
