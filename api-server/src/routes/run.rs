//! Run API endpoints
//!
//! Compute nodes report run progress here; a terminal run rejects further
//! updates with a conflict.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::patch,
    Json, Router,
};
use uuid::Uuid;

use fed_core::run::RunUpdate;

use super::{map_core_error, RouteError};
use crate::auth::principal_from_headers;
use crate::routes::task::RunResponse;
use crate::state::AppState;

/// PATCH /api/run/:id - Apply a node-reported status update
async fn report_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<RunUpdate>,
) -> Result<Json<RunResponse>, RouteError> {
    let principal = principal_from_headers(&state, &headers).await?;
    let run = state
        .service()
        .report_run(&principal, id, update)
        .await
        .map_err(map_core_error)?;
    Ok(Json(RunResponse::from(run)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/run/{id}", patch(report_run))
}
