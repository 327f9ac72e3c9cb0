//! surgegate-api — REST surface for SurgeGate.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness and queue depth |
//! | POST | `/api/v1/admission/check` | Admit or deny one request (`X-API-Key` header) |
//! | GET | `/api/v1/governance/pending` | List pending decisions |
//! | POST | `/api/v1/governance/approve/{id}` | Approve one pending decision |
//! | POST | `/api/v1/governance/approve-all` | Approve every pending decision |
//! | POST | `/api/v1/governance/reject/{id}` | Discard one pending decision |
//! | GET | `/api/v1/governance/history` | Recent applied decisions (`?limit=N`) |
//! | GET | `/api/v1/policies` | Current policy and live usage per key |
//! | GET | `/api/v1/insights` | Last control-loop observation per key |
//! | GET | `/api/v1/surge` | Keys with a non-zero surge probability |

pub mod governance_handlers;
pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use surgegate_control::InsightBoard;
use surgegate_governance::DecisionEngine;
use surgegate_limiter::AdmissionGate;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub gate: AdmissionGate,
    pub engine: DecisionEngine,
    pub board: InsightBoard,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/admission/check", post(handlers::admission_check))
        .route("/governance/pending", get(governance_handlers::list_pending))
        .route("/governance/approve/{id}", post(governance_handlers::approve))
        .route("/governance/approve-all", post(governance_handlers::approve_all))
        .route("/governance/reject/{id}", post(governance_handlers::reject))
        .route("/governance/history", get(governance_handlers::history))
        .route("/policies", get(handlers::list_policies))
        .route("/insights", get(handlers::list_insights))
        .route("/surge", get(handlers::surge_status))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health).with_state(state))
}
