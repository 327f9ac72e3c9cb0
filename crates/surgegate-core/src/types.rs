//! Domain types shared across the SurgeGate crates.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Lowest rate a policy may enforce.
pub const MIN_RPS: f64 = 1.0;

/// Smallest bucket a policy may enforce.
pub const MIN_BURST: u32 = 5;

// ── Tenants ───────────────────────────────────────────────────────

/// Customer class resolved from an API key.
///
/// Ordering follows business priority: `Free < Pro < Enterprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TenantTier {
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "pro")]
    Pro,
    #[serde(rename = "ent")]
    Enterprise,
}

impl TenantTier {
    pub const ALL: [TenantTier; 3] = [TenantTier::Free, TenantTier::Pro, TenantTier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantTier::Free => "free",
            TenantTier::Pro => "pro",
            TenantTier::Enterprise => "ent",
        }
    }
}

impl fmt::Display for TenantTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(tenant, resource)` pair. Every policy, bucket and usage window is
/// keyed by one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub tenant: TenantTier,
    pub resource: String,
}

impl PairKey {
    pub fn new(tenant: TenantTier, resource: impl Into<String>) -> Self {
        Self {
            tenant,
            resource: resource.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.resource)
    }
}

// ── Policy ────────────────────────────────────────────────────────

/// The currently enforced limits for a key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Sustained refill rate (tokens per second).
    pub rps: f64,
    /// Bucket capacity.
    pub burst: u32,
}

impl Policy {
    /// Build a policy, raising values below the floors to `MIN_RPS` / `MIN_BURST`.
    pub fn clamped(rps: f64, burst: u32) -> Self {
        let rps = if rps.is_finite() { rps.max(MIN_RPS) } else { MIN_RPS };
        Self {
            rps,
            burst: burst.max(MIN_BURST),
        }
    }
}

// ── Decisions ─────────────────────────────────────────────────────

/// Direction of a proposed policy change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Up,
    Down,
    Same,
}

impl Action {
    /// Parse an oracle-supplied action label (case-insensitive).
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Action::Up),
            "down" => Some(Action::Down),
            "same" => Some(Action::Same),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Same => "same",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a proposed change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// A well-formed decision object returned by the oracle.
    Oracle,
    /// Degraded path: direction inferred from unparseable oracle text.
    IntentExtracted,
    /// Internal surge predictor.
    Preemptive,
}

/// Current unix time in whole seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
