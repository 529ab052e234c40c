//! Free/busy endpoint

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use freebusy_core::{BusyResponse, CalendarFetcher};
use serde::Deserialize;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router<F: CalendarFetcher + 'static>() -> Router<AppState<F>> {
    Router::new().route("/api/freebusy", get(freebusy::<F>))
}

/// Query window; both bounds are ISO 8601 strings
#[derive(Debug, Deserialize)]
pub struct FreeBusyQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// GET /api/freebusy?start=..&end=.. - Busy intervals inside the window
async fn freebusy<F: CalendarFetcher + 'static>(
    State(state): State<AppState<F>>,
    Query(query): Query<FreeBusyQuery>,
) -> Result<Json<BusyResponse>, AppError> {
    let response = state
        .freebusy()
        .handle(query.start.as_deref(), query.end.as_deref())
        .await?;

    Ok(Json(response))
}
