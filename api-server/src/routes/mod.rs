//! Route handlers

pub mod health;
pub mod run;
pub mod task;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use fed_core::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type RouteError = (StatusCode, Json<ErrorResponse>);

/// Map a core error onto an HTTP status and JSON body
pub(crate) fn map_core_error(err: Error) -> RouteError {
    let status = match &err {
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Storage(_) | Error::BlobStore(_) | Error::Io(_) | Error::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
