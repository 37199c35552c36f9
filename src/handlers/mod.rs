pub mod admin;

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{LatencyError, StoreError, ValidationError};

// ─── Shared response envelope ────────────────────────────────────

/// Body returned by mutating admin operations.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    Store(StoreError),
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<LatencyError> for AppError {
    fn from(e: LatencyError) -> Self {
        match e {
            LatencyError::Store(e) => e.into(),
            LatencyError::Validation(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Store(e) => {
                tracing::error!(error = %e, "latency store request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
