//! Proposal, queue and audit types.

use serde::Serialize;

use surgegate_core::{Action, DecisionSource, PairKey, TenantTier};

/// A change offered to the engine by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionProposal {
    pub key: PairKey,
    pub action: Action,
    pub new_rps: f64,
    pub new_burst: u32,
    pub confidence: f64,
    pub reason: String,
    pub source: DecisionSource,
}

/// Why a proposal was queued instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    LargeChange,
    LowConfidence,
}

/// A proposal awaiting an operator. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDecision {
    pub id: String,
    pub tenant: TenantTier,
    pub resource: String,
    pub action: Action,
    pub proposed_rps: f64,
    pub proposed_burst: u32,
    pub confidence: f64,
    pub reason: String,
    pub source: DecisionSource,
    pub queued_because: QueueReason,
    /// Unix seconds.
    pub created_at: u64,
    pub previous_rps: f64,
    pub scaling_factor: f64,
}

impl PendingDecision {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.tenant, self.resource.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Applied by the engine without review.
    Auto,
    /// Applied after operator approval.
    Approved,
}

/// Audit entry for an applied change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub id: String,
    pub tenant: TenantTier,
    pub resource: String,
    pub action: Action,
    pub previous_rps: f64,
    pub previous_burst: u32,
    pub new_rps: f64,
    pub new_burst: u32,
    pub confidence: f64,
    pub reason: String,
    pub source: DecisionSource,
    pub mode: ApplyMode,
    /// When the proposal was first made (unix seconds).
    pub proposed_at: u64,
    /// When the change reached the policy store (unix seconds).
    pub applied_at: u64,
}

/// Outcome of [`DecisionEngine::resolve`](crate::DecisionEngine::resolve).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Applied { record: DecisionRecord },
    Pending { id: String, reason: QueueReason },
    NoChange,
}

/// Most recent history entries plus the all-time count.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    /// Oldest first.
    pub decisions: Vec<DecisionRecord>,
    pub total: u64,
}
