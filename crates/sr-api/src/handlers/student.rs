//! Student registration and lookup handlers (§C.1 of SPEC_FULL.md).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sr_domain::DomainError;
use sr_ports::StudentRepository;
use tracing::instrument;

use crate::handlers::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterStudentRequest {
    pub enrollment_number: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: i64,
    pub enrollment_number: String,
    pub name: String,
    pub email: Option<String>,
    pub total_approved_hours: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<sr_domain::Student> for StudentResponse {
    fn from(s: sr_domain::Student) -> Self {
        Self {
            id: s.id,
            enrollment_number: s.enrollment_number,
            name: s.name,
            email: s.email,
            total_approved_hours: s.total_approved_hours,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

/// POST /api/v1/student/register
#[instrument(skip(state, body))]
pub async fn register_student(
    State(state): State<AppState>,
    Json(body): Json<RegisterStudentRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<StudentResponse>)> {
    if body.enrollment_number.trim().is_empty() || body.name.trim().is_empty() {
        return Err(ApiError::BadRequest {
            message: "enrollment_number and name are required".to_string(),
        });
    }

    if state
        .students
        .get_by_enrollment_number(&body.enrollment_number)
        .await?
        .is_some()
    {
        return Err(DomainError::StudentAlreadyExists {
            enrollment_number: body.enrollment_number,
        }
        .into());
    }

    let student = state
        .students
        .create(&body.enrollment_number, &body.name, body.email.as_deref())
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(student.into())))
}

/// GET /api/v1/student/{enrollment_number}
#[instrument(skip(state))]
pub async fn get_student(
    State(state): State<AppState>,
    Path(enrollment_number): Path<String>,
) -> ApiResult<Json<StudentResponse>> {
    let student = state
        .students
        .get_by_enrollment_number(&enrollment_number)
        .await?
        .ok_or(DomainError::StudentNotFound { enrollment_number })?;

    Ok(Json(student.into()))
}

/// PUT /api/v1/student/{enrollment_number}
#[instrument(skip(state, body))]
pub async fn update_student(
    State(state): State<AppState>,
    Path(enrollment_number): Path<String>,
    Json(body): Json<UpdateStudentRequest>,
) -> ApiResult<Json<StudentResponse>> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest {
                message: "name cannot be blank".to_string(),
            });
        }
    }

    state
        .students
        .get_by_enrollment_number(&enrollment_number)
        .await?
        .ok_or_else(|| DomainError::StudentNotFound {
            enrollment_number: enrollment_number.clone(),
        })?;

    let student = state
        .students
        .update(
            &enrollment_number,
            body.name.as_deref(),
            body.email.as_ref().map(|e| Some(e.as_str())),
        )
        .await?;

    Ok(Json(student.into()))
}
