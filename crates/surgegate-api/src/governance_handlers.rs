//! REST API handlers for the approval queue and decision history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::error;

use surgegate_governance::{GovernanceError, PendingDecision};

use crate::ApiState;
use crate::handlers::{ApiResponse, error_response};

/// Entries returned by the history endpoint when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Serialize)]
struct PendingList {
    pending: Vec<PendingDecision>,
    count: usize,
}

#[derive(Serialize)]
struct ApproveAllResult {
    approved: usize,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn governance_error(e: GovernanceError) -> axum::response::Response {
    match e {
        GovernanceError::NotFound(_) => {
            error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response()
        }
        GovernanceError::Store(_) => {
            error!(error = %e, "governance action failed");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /api/v1/governance/pending
pub async fn list_pending(State(state): State<ApiState>) -> impl IntoResponse {
    let pending = state.engine.list_pending();
    ApiResponse::ok(PendingList {
        count: pending.len(),
        pending,
    })
}

/// POST /api/v1/governance/approve/{id}
pub async fn approve(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.engine.approve(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => governance_error(e),
    }
}

/// POST /api/v1/governance/approve-all
pub async fn approve_all(State(state): State<ApiState>) -> impl IntoResponse {
    match state.engine.approve_all() {
        Ok(records) => ApiResponse::ok(ApproveAllResult {
            approved: records.len(),
        })
        .into_response(),
        Err(e) => governance_error(e),
    }
}

/// POST /api/v1/governance/reject/{id}
pub async fn reject(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.engine.reject(&id) {
        Ok(rejected) => ApiResponse::ok(rejected).into_response(),
        Err(e) => governance_error(e),
    }
}

/// GET /api/v1/governance/history?limit=N
pub async fn history(State(state): State<ApiState>, Query(query): Query<HistoryQuery>) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    ApiResponse::ok(state.engine.history(limit))
}
