//! Read-only category catalog (§C.4): the policy data coordinators and
//! the LLM categorization prompt both consult.

use axum::{extract::State, Json};
use serde::Serialize;
use sr_ports::CategoryRepository;
use tracing::instrument;

use crate::handlers::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub calculation_type: String,
    pub calculation_summary: String,
    pub max_total_hours: i64,
}

impl From<sr_domain::ActivityCategory> for CategoryResponse {
    fn from(c: sr_domain::ActivityCategory) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone(),
            calculation_type: c.calculation_type.as_str().to_string(),
            calculation_summary: c.calc_description(),
            max_total_hours: c.max_total_hours,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListCategoriesResponse {
    pub categories: Vec<CategoryResponse>,
}

/// GET /api/v1/categories
#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<ListCategoriesResponse>> {
    let categories = state.categories.list_all().await?;
    Ok(Json(ListCategoriesResponse {
        categories: categories.into_iter().map(CategoryResponse::from).collect(),
    }))
}
