//! Admission, policy and insight handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use surgegate_limiter::AdmissionError;

use crate::ApiState;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Health ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    keys: usize,
    pending_decisions: usize,
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(HealthStatus {
        status: "ok",
        keys: state.gate.store().len(),
        pending_decisions: state.engine.pending_count(),
    })
}

// ── Admission ──────────────────────────────────────────────────

/// Admission check request body.
#[derive(Deserialize)]
pub struct CheckRequest {
    pub resource: String,
}

#[derive(Serialize)]
struct CheckResult {
    allowed: bool,
    resource: String,
}

/// POST /api/v1/admission/check
pub async fn admission_check(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    match state.gate.check(api_key, &req.resource) {
        Ok(true) => ApiResponse::ok(CheckResult {
            allowed: true,
            resource: req.resource,
        })
        .into_response(),
        Ok(false) => error_response("rate limited", StatusCode::TOO_MANY_REQUESTS).into_response(),
        Err(e @ AdmissionError::Unauthorized) => {
            error_response(&e.to_string(), StatusCode::UNAUTHORIZED).into_response()
        }
        Err(e @ AdmissionError::UnknownResource(_)) => {
            error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response()
        }
        Err(e @ AdmissionError::KeyCapacity(_)) => {
            error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
    }
}

// ── Policies & insights ────────────────────────────────────────

/// GET /api/v1/policies
pub async fn list_policies(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.gate.store().snapshot())
}

/// GET /api/v1/insights
pub async fn list_insights(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.board.snapshot())
}

/// GET /api/v1/surge
pub async fn surge_status(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.board.surging())
}
