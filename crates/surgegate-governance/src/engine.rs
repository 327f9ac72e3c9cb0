//! DecisionEngine — auto-apply rules, approval queue, bounded history.
//!
//! All queue and history state sits behind one mutex. Policy writes are
//! made while holding it, so lock order is always governance → key; the
//! admission path only ever takes key locks.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use surgegate_core::{Action, GovernanceConfig, epoch_secs};
use surgegate_limiter::PolicyStore;

use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{
    ApplyMode, DecisionProposal, DecisionRecord, HistoryPage, PendingDecision, QueueReason,
    Resolution,
};

#[derive(Debug, Default)]
struct GovernanceState {
    /// Insertion ordered.
    pending: Vec<PendingDecision>,
    history: VecDeque<DecisionRecord>,
    total_applied: u64,
}

/// Shared decision engine. Cloning shares the same queue and history.
#[derive(Clone)]
pub struct DecisionEngine {
    store: PolicyStore,
    config: GovernanceConfig,
    state: Arc<Mutex<GovernanceState>>,
}

impl DecisionEngine {
    pub fn new(store: PolicyStore, config: GovernanceConfig) -> Self {
        Self {
            store,
            config,
            state: Arc::new(Mutex::new(GovernanceState::default())),
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// `true` when `new_rps / old_rps` is outside the open interval
    /// `(1/f, f)` for the configured large-change factor `f`.
    pub fn is_large_change(&self, old_rps: f64, new_rps: f64) -> bool {
        if old_rps <= 0.0 {
            return false;
        }
        let ratio = new_rps / old_rps;
        let factor = self.config.large_change_factor;
        ratio >= factor || ratio <= 1.0 / factor
    }

    /// Apply a proposal now, queue it for approval, or do nothing.
    ///
    /// `same` is always a no-op. Anything else is applied when its
    /// confidence reaches the floor and the change is not large; otherwise
    /// it is queued. A pending decision for the same key with the same
    /// target is refreshed in place and keeps its id; a different target
    /// replaces it.
    pub fn resolve(&self, proposal: DecisionProposal) -> GovernanceResult<Resolution> {
        if proposal.action == Action::Same {
            return Ok(Resolution::NoChange);
        }

        let mut state = self.state.lock();
        let current = self.store.ensure(&proposal.key)?;
        let now = epoch_secs();

        let large = self.is_large_change(current.rps, proposal.new_rps);
        let confident = proposal.confidence >= self.config.min_confidence;

        if confident && !large {
            let applied = self
                .store
                .apply_policy(&proposal.key, proposal.new_rps, proposal.new_burst)?;
            let record = DecisionRecord {
                id: Uuid::new_v4().to_string(),
                tenant: proposal.key.tenant,
                resource: proposal.key.resource.clone(),
                action: proposal.action,
                previous_rps: current.rps,
                previous_burst: current.burst,
                new_rps: applied.rps,
                new_burst: applied.burst,
                confidence: proposal.confidence,
                reason: proposal.reason,
                source: proposal.source,
                mode: ApplyMode::Auto,
                proposed_at: now,
                applied_at: now,
            };
            info!(
                key = %proposal.key,
                action = %record.action,
                old_rps = current.rps,
                new_rps = record.new_rps,
                confidence = record.confidence,
                reason = %record.reason,
                "decision applied"
            );
            self.push_history(&mut state, record.clone());
            return Ok(Resolution::Applied { record });
        }

        let queued_because = if large {
            QueueReason::LargeChange
        } else {
            QueueReason::LowConfidence
        };

        if let Some(pos) = state.pending.iter().position(|p| p.key() == proposal.key) {
            let existing = &mut state.pending[pos];
            if existing.action == proposal.action
                && existing.source == proposal.source
                && existing.proposed_rps == proposal.new_rps
                && existing.proposed_burst == proposal.new_burst
                && existing.previous_rps == current.rps
            {
                // Same target: keep the id operators may already hold, and its age.
                existing.confidence = proposal.confidence;
                existing.reason = proposal.reason;
                existing.queued_because = queued_because;
                debug!(key = %proposal.key, id = %existing.id, "pending decision refreshed");
                return Ok(Resolution::Pending {
                    id: existing.id.clone(),
                    reason: queued_because,
                });
            }
            let old = state.pending.remove(pos);
            info!(key = %proposal.key, superseded = %old.id, "pending decision superseded");
        }

        let pending = PendingDecision {
            id: Uuid::new_v4().to_string(),
            tenant: proposal.key.tenant,
            resource: proposal.key.resource.clone(),
            action: proposal.action,
            proposed_rps: proposal.new_rps,
            proposed_burst: proposal.new_burst,
            confidence: proposal.confidence,
            reason: proposal.reason,
            source: proposal.source,
            queued_because,
            created_at: now,
            previous_rps: current.rps,
            scaling_factor: proposal.new_rps / current.rps,
        };
        warn!(
            key = %proposal.key,
            id = %pending.id,
            old_rps = current.rps,
            new_rps = pending.proposed_rps,
            confidence = pending.confidence,
            queued_because = ?queued_because,
            "decision queued for approval"
        );

        let id = pending.id.clone();
        state.pending.push(pending);
        Ok(Resolution::Pending {
            id,
            reason: queued_because,
        })
    }

    /// Apply one pending decision. Unknown ids change nothing.
    pub fn approve(&self, id: &str) -> GovernanceResult<DecisionRecord> {
        let mut state = self.state.lock();
        let pos = state
            .pending
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| GovernanceError::NotFound(id.to_string()))?;

        let record = self.apply_pending(&state.pending[pos], epoch_secs())?;
        state.pending.remove(pos);
        info!(
            id,
            tenant = %record.tenant,
            resource = %record.resource,
            old_rps = record.previous_rps,
            new_rps = record.new_rps,
            "decision approved"
        );
        self.push_history(&mut state, record.clone());
        Ok(record)
    }

    /// Apply every pending decision.
    ///
    /// Holds the governance lock throughout, so readers see either the
    /// whole queue or none of it. Returns the applied records in queue
    /// order.
    pub fn approve_all(&self) -> GovernanceResult<Vec<DecisionRecord>> {
        let mut state = self.state.lock();

        // Every key must still resolve before anything is touched.
        if let Some(missing) = state
            .pending
            .iter()
            .find(|p| self.store.policy(&p.key()).is_none())
        {
            return Err(GovernanceError::NotFound(missing.key().to_string()));
        }

        let now = epoch_secs();
        let pending = std::mem::take(&mut state.pending);
        let mut records = Vec::with_capacity(pending.len());
        for decision in &pending {
            let record = self.apply_pending(decision, now)?;
            self.push_history(&mut state, record.clone());
            records.push(record);
        }

        info!(approved = records.len(), "bulk approval");
        Ok(records)
    }

    /// Discard one pending decision without applying it.
    pub fn reject(&self, id: &str) -> GovernanceResult<PendingDecision> {
        let mut state = self.state.lock();
        let pos = state
            .pending
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| GovernanceError::NotFound(id.to_string()))?;
        let rejected = state.pending.remove(pos);
        info!(id, key = %rejected.key(), "decision rejected");
        Ok(rejected)
    }

    /// Drop pending decisions older than the configured TTL. A TTL of zero
    /// disables expiry. Returns the expired ids.
    pub fn expire_stale(&self, now: u64) -> Vec<String> {
        let ttl = self.config.pending_ttl_secs;
        if ttl == 0 {
            return Vec::new();
        }

        let mut state = self.state.lock();
        let mut expired = Vec::new();
        state.pending.retain(|p| {
            if now.saturating_sub(p.created_at) >= ttl {
                expired.push(p.id.clone());
                false
            } else {
                true
            }
        });
        if !expired.is_empty() {
            info!(count = expired.len(), ttl_secs = ttl, "pending decisions expired");
        }
        expired
    }

    pub fn list_pending(&self) -> Vec<PendingDecision> {
        self.state.lock().pending.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// The `limit` most recent applied decisions, oldest first.
    pub fn history(&self, limit: usize) -> HistoryPage {
        let state = self.state.lock();
        let skip = state.history.len().saturating_sub(limit);
        HistoryPage {
            decisions: state.history.iter().skip(skip).cloned().collect(),
            total: state.total_applied,
        }
    }

    fn apply_pending(&self, decision: &PendingDecision, now: u64) -> GovernanceResult<DecisionRecord> {
        let key = decision.key();
        let previous = self.store.ensure(&key)?;
        let applied = self
            .store
            .apply_policy(&key, decision.proposed_rps, decision.proposed_burst)?;
        Ok(DecisionRecord {
            id: decision.id.clone(),
            tenant: decision.tenant,
            resource: decision.resource.clone(),
            action: decision.action,
            previous_rps: previous.rps,
            previous_burst: previous.burst,
            new_rps: applied.rps,
            new_burst: applied.burst,
            confidence: decision.confidence,
            reason: decision.reason.clone(),
            source: decision.source,
            mode: ApplyMode::Approved,
            proposed_at: decision.created_at,
            applied_at: now,
        })
    }

    fn push_history(&self, state: &mut GovernanceState, record: DecisionRecord) {
        state.history.push_back(record);
        state.total_applied += 1;
        while state.history.len() > self.config.history_capacity.max(1) {
            state.history.pop_front();
        }
    }
}
