//! Per-student activity history (§C.5), the record a student consults to
//! see every certificate that has reached a decision.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use sr_domain::DomainError;
use sr_ports::{ActivityRepository, StudentRepository};
use tracing::instrument;

use crate::handlers::coordinator::ActivityResponse;
use crate::handlers::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ListActivitiesResponse {
    pub activities: Vec<ActivityResponse>,
}

/// GET /api/v1/student/{enrollment_number}/activities
#[instrument(skip(state))]
pub async fn list_student_activities(
    State(state): State<AppState>,
    Path(enrollment_number): Path<String>,
) -> ApiResult<Json<ListActivitiesResponse>> {
    let student = state
        .students
        .get_by_enrollment_number(&enrollment_number)
        .await?
        .ok_or(DomainError::StudentNotFound { enrollment_number })?;

    let activities = state.activities.list_for_student(student.id).await?;

    Ok(Json(ListActivitiesResponse {
        activities: activities.into_iter().map(ActivityResponse::from).collect(),
    }))
}
