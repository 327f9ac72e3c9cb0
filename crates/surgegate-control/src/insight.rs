//! Last observation per key, for the insight and surge APIs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use surgegate_core::{PairKey, Scenario, TenantTier};
use surgegate_surge::SurgeSignal;

#[derive(Debug, Clone, Serialize)]
pub struct KeyInsight {
    pub tenant: TenantTier,
    pub resource: String,
    pub rps_limit: f64,
    pub observed_rps: f64,
    pub blocked_ratio: f64,
    pub utilization: f64,
    pub scenario: Scenario,
    pub surge: SurgeSignal,
    pub anomaly_score: f64,
    pub last_outcome: &'static str,
    /// Unix seconds.
    pub updated_at: u64,
}

#[derive(Clone, Default)]
pub struct InsightBoard {
    inner: Arc<RwLock<HashMap<PairKey, KeyInsight>>>,
}

impl InsightBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: PairKey, insight: KeyInsight) {
        self.inner.write().insert(key, insight);
    }

    pub fn get(&self, key: &PairKey) -> Option<KeyInsight> {
        self.inner.read().get(key).cloned()
    }

    /// All insights, sorted by key.
    pub fn snapshot(&self) -> Vec<KeyInsight> {
        let mut all: Vec<(PairKey, KeyInsight)> = self
            .inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.into_iter().map(|(_, v)| v).collect()
    }

    /// Insights with a non-zero surge probability, most likely first.
    pub fn surging(&self) -> Vec<KeyInsight> {
        let mut surging: Vec<KeyInsight> = self
            .snapshot()
            .into_iter()
            .filter(|i| i.surge.probability > 0.0)
            .collect();
        surging.sort_by(|a, b| b.surge.probability.total_cmp(&a.surge.probability));
        surging
    }
}
