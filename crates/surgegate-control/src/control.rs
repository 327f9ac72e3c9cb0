//! ControlLoop — periodic evaluation of every tracked key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use surgegate_core::{Action, DecisionSource, PairKey, Scenario, TierTable, epoch_secs};
use surgegate_governance::{DecisionEngine, DecisionProposal, Resolution};
use surgegate_limiter::PolicyStore;
use surgegate_oracle::{DecisionOracle, OracleRequest, RetryPolicy, consult, validate};
use surgegate_surge::{SurgePredictor, anomaly_score, propose};

use crate::insight::{InsightBoard, KeyInsight};

/// Anomaly scores above this are logged.
const ANOMALY_ALERT: f64 = 0.5;

/// What one key's evaluation led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "resolution", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// No traffic and no surge; nothing asked.
    Idle,
    /// A preemptive proposal was resolved; the oracle was skipped.
    Preemptive(Resolution),
    /// The oracle's validated decision was resolved.
    Oracle(Resolution),
    /// The oracle answered but validation discarded the decision.
    Rejected,
    /// Every oracle attempt failed; no change.
    OracleFailed,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Idle => "idle",
            CycleOutcome::Preemptive(r) | CycleOutcome::Oracle(r) => match r {
                Resolution::Applied { .. } => "applied",
                Resolution::Pending { .. } => "pending",
                Resolution::NoChange => "no_change",
            },
            CycleOutcome::Rejected => "rejected",
            CycleOutcome::OracleFailed => "oracle_failed",
        }
    }
}

/// Tally of one full pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub evaluated: usize,
    pub applied: usize,
    pub queued: usize,
    pub failed: usize,
    pub expired: usize,
}

pub struct ControlLoop {
    store: PolicyStore,
    engine: DecisionEngine,
    oracle: Arc<dyn DecisionOracle>,
    tiers: TierTable,
    retry: RetryPolicy,
    predictor: Mutex<SurgePredictor>,
    board: InsightBoard,
}

impl ControlLoop {
    pub fn new(
        store: PolicyStore,
        engine: DecisionEngine,
        oracle: Arc<dyn DecisionOracle>,
        retry: RetryPolicy,
        board: InsightBoard,
    ) -> Self {
        let tiers = store.tiers().clone();
        Self {
            store,
            engine,
            oracle,
            tiers,
            retry,
            predictor: Mutex::new(SurgePredictor::new()),
            board,
        }
    }

    pub fn board(&self) -> &InsightBoard {
        &self.board
    }

    /// Evaluate one key against its window ending at `now`.
    pub async fn evaluate_key(&self, key: &PairKey, now: Instant) -> anyhow::Result<CycleOutcome> {
        let (policy, sample) = self
            .store
            .drain_window(key, now)
            .ok_or_else(|| anyhow!("key {key} is not tracked"))?;

        let ok_rps = sample.ok_rps();
        let blocked_ratio = sample.blocked_ratio();
        let utilization = ok_rps / policy.rps;
        let scenario = Scenario::classify(ok_rps, blocked_ratio, utilization);
        let profile = self.tiers.get(key.tenant);

        let signal = self.predictor.lock().analyze(key, profile.priority, ok_rps, now);

        let anomaly = anomaly_score(policy.rps, ok_rps);
        if anomaly > ANOMALY_ALERT {
            warn!(%key, ok_rps, baseline_rps = policy.rps, score = anomaly, "traffic anomaly");
        }

        debug!(
            %key,
            ok = sample.ok,
            blocked = sample.blocked,
            ok_rps,
            blocked_ratio,
            utilization,
            scenario = %scenario,
            "window drained"
        );

        let outcome = if let Some(proposal) = propose(key, profile, policy, &signal) {
            let resolution = self
                .engine
                .resolve(DecisionProposal {
                    key: key.clone(),
                    action: Action::Up,
                    new_rps: proposal.new_rps,
                    new_burst: proposal.new_burst,
                    confidence: proposal.confidence,
                    reason: proposal.reason,
                    source: DecisionSource::Preemptive,
                })
                .with_context(|| format!("resolving preemptive proposal for {key}"))?;
            CycleOutcome::Preemptive(resolution)
        } else if sample.total() == 0 {
            CycleOutcome::Idle
        } else {
            let request = OracleRequest::new(key, policy, ok_rps, blocked_ratio, profile.revenue_per_request);
            match consult(self.oracle.as_ref(), &request, &self.retry).await {
                Err(_) => CycleOutcome::OracleFailed,
                Ok(verdict) => match validate(&verdict.raw, policy, verdict.source) {
                    None => CycleOutcome::Rejected,
                    Some(decision) => {
                        let resolution = self
                            .engine
                            .resolve(DecisionProposal {
                                key: key.clone(),
                                action: decision.action,
                                new_rps: decision.new_rps,
                                new_burst: decision.new_burst,
                                confidence: decision.confidence,
                                reason: decision.reason,
                                source: decision.source,
                            })
                            .with_context(|| format!("resolving oracle decision for {key}"))?;
                        CycleOutcome::Oracle(resolution)
                    }
                },
            }
        };

        self.board.record(
            key.clone(),
            KeyInsight {
                tenant: key.tenant,
                resource: key.resource.clone(),
                rps_limit: policy.rps,
                observed_rps: ok_rps,
                blocked_ratio,
                utilization,
                scenario,
                surge: signal,
                anomaly_score: anomaly,
                last_outcome: outcome.label(),
                updated_at: epoch_secs(),
            },
        );
        Ok(outcome)
    }

    /// One full pass: expire stale approvals, then evaluate every key.
    ///
    /// A failing key is logged and skipped; the pass always completes.
    pub async fn evaluate_all(&self) -> CycleReport {
        let mut report = CycleReport {
            expired: self.engine.expire_stale(epoch_secs()).len(),
            ..CycleReport::default()
        };

        for key in self.store.active_keys() {
            match self.evaluate_key(&key, Instant::now()).await {
                Ok(outcome) => {
                    report.evaluated += 1;
                    match outcome.label() {
                        "applied" => report.applied += 1,
                        "pending" => report.queued += 1,
                        "rejected" | "oracle_failed" => report.failed += 1,
                        _ => {}
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(%key, error = %e, "key evaluation failed");
                }
            }
        }

        debug!(?report, "control cycle complete");
        report
    }

    /// Run passes every `interval` until `shutdown` changes.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs_f64(), "control loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.evaluate_all().await;
                }
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }
}
