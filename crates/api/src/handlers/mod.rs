pub mod alerts;
pub mod context;
pub mod dashboard;
pub mod health;
pub mod storefronts;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use toko_database::DatabaseError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Map data-layer errors onto HTTP responses.
pub fn db_error(e: DatabaseError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &e {
        DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DatabaseError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate"),
        DatabaseError::Invalid { .. } => (StatusCode::BAD_REQUEST, "invalid"),
        DatabaseError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        DatabaseError::Concurrency(_) => (StatusCode::CONFLICT, "concurrency"),
        DatabaseError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
    };
    (status, Json(ErrorResponse::new(code, &e.to_string())))
}
