use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
};

use crate::api::{assemble, DatasetPage};
use crate::error::ApiError;
use crate::query::{DatasetParams, RawDatasetQuery};
use crate::state::AppState;

pub const ECOM_EVENTS: &str = "ecom_events";

/// GET /datasets/ecom_events - one page of events, optionally within `[start_time, end_time)`
pub async fn ecom_events_get(
    State(state): State<AppState>,
    query: Result<Query<RawDatasetQuery>, QueryRejection>,
) -> Result<Json<DatasetPage>, ApiError> {
    let Query(raw) = query.map_err(|e| ApiError::validation_error(e.body_text(), None))?;

    let params = DatasetParams::parse(&raw)?;
    let plan = state.planner.plan(&params)?;
    let result = state.store.read_page(&plan).await?;

    tracing::debug!(
        dataset = ECOM_EVENTS,
        page = params.page,
        page_size = params.page_size,
        total = result.total,
        rows = result.rows.len(),
        "Dataset page served"
    );

    Ok(Json(assemble(ECOM_EVENTS, &params, result)))
}
