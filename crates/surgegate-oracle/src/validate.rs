//! Range checks between the oracle and the policy store.
//!
//! Any out-of-range field discards the whole decision. Nothing here is
//! partially applied.

use serde::Serialize;
use tracing::warn;

use surgegate_core::{Action, DecisionSource, Policy};

use crate::extract::RawDecision;

const RPS_RANGE: (f64, f64) = (1.0, 1000.0);
const BURST_RANGE: (f64, f64) = (5.0, 5000.0);
const CONFIDENCE_FLOOR: f64 = 0.5;
const DEFAULT_CONFIDENCE: f64 = 0.7;
const MAX_REASON_CHARS: usize = 80;

/// A decision whose every field is within legal bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedDecision {
    pub action: Action,
    pub new_rps: f64,
    pub new_burst: u32,
    pub confidence: f64,
    pub reason: String,
    pub source: DecisionSource,
}

/// Check a raw decision against the current policy.
///
/// Missing `new_rps` keeps the current rate; missing `new_burst` becomes
/// `max(10, 3 × new_rps)`. Confidence is clamped into `[0.5, 1.0]`.
pub fn validate(raw: &RawDecision, current: Policy, source: DecisionSource) -> Option<ValidatedDecision> {
    let Some(action) = Action::parse(&raw.action) else {
        warn!(action = %raw.action, "oracle decision rejected: invalid action");
        return None;
    };

    let new_rps = raw.new_rps.unwrap_or(current.rps);
    if !new_rps.is_finite() || new_rps < RPS_RANGE.0 || new_rps > RPS_RANGE.1 {
        warn!(new_rps, "oracle decision rejected: rps out of range");
        return None;
    }

    let new_burst = raw
        .new_burst
        .unwrap_or_else(|| (new_rps * 3.0).max(10.0))
        .trunc();
    if !new_burst.is_finite() || new_burst < BURST_RANGE.0 || new_burst > BURST_RANGE.1 {
        warn!(new_burst, "oracle decision rejected: burst out of range");
        return None;
    }

    let confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    if !confidence.is_finite() {
        warn!("oracle decision rejected: confidence is not a number");
        return None;
    }

    let reason: String = raw
        .reason
        .as_deref()
        .unwrap_or("oracle_decision")
        .chars()
        .take(MAX_REASON_CHARS)
        .collect();

    Some(ValidatedDecision {
        action,
        new_rps,
        new_burst: new_burst as u32,
        confidence: confidence.clamp(CONFIDENCE_FLOOR, 1.0),
        reason,
        source,
    })
}
