use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use convalid_core::{ComparisonResult, DateRange};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ValidateQuery {
    pub customer_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Resolves the account and range for `query`, then runs the comparison.
pub async fn run_comparison(
    state: &AppState,
    query: &ValidateQuery,
) -> Result<ComparisonResult, AppError> {
    let customer_id = state
        .customer_id(query.customer_id.as_deref())
        .ok_or_else(|| {
            AppError::BadRequest(
                "customer_id is required (or set GOOGLE_ADS_CUSTOMER_ID)".to_string(),
            )
        })?;
    let range = DateRange::parse(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        state.today(),
    )?;
    Ok(state.comparator.compare(&customer_id, range).await)
}

/// `GET /api/conversions/validate` - cross-source conversion comparison.
///
/// Dates default to the 30 days ending today. Sources that fail or are not
/// configured are reported through `comparison.reporting`, not as errors.
#[tracing::instrument(skip(state))]
pub async fn validate_conversions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = run_comparison(&state, &query).await?;
    Ok(Json(json!({ "data": result })))
}
