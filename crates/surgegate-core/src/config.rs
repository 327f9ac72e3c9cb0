//! surgegate.toml configuration parser with environment overrides.
//!
//! Loading order: built-in defaults, then the optional TOML file, then
//! environment variables. `validate()` runs last and rejects settings the
//! control plane cannot operate under.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Policy, TenantTier};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen port for the governance/admission API.
    pub port: u16,
    pub oracle: OracleConfig,
    pub control: ControlConfig,
    pub governance: GovernanceConfig,
    pub tiers: TierTable,
    /// Opaque API key → tenant tier.
    pub api_keys: HashMap<String, TenantTier>,
    /// Protected resources. Admission for anything else is refused.
    pub resources: Vec<String>,
    /// Upper bound on tracked `(tenant, resource)` keys.
    pub max_keys: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    /// Total budget for one consultation, split across attempts.
    pub timeout_secs: f64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub interval_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Decisions below this confidence are queued for approval.
    pub min_confidence: f64,
    /// Changes with `new/old >= factor` or `<= 1/factor` are queued.
    pub large_change_factor: f64,
    /// Pending decisions older than this are discarded.
    pub pending_ttl_secs: u64,
    /// Applied decisions kept in memory for history queries.
    pub history_capacity: usize,
}

/// Per-tier defaults and business weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierProfile {
    pub base_rps: f64,
    pub base_burst: u32,
    pub revenue_per_request: f64,
    /// Business priority; feeds the surge multiplier `0.8 + priority * 0.15`.
    pub priority: f64,
    pub preemptive: PreemptiveFactors,
}

/// Preemptive scaling multipliers per severity band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreemptiveFactors {
    pub growth: f64,
    pub surge: f64,
    pub ddos: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub free: TierProfile,
    pub pro: TierProfile,
    pub ent: TierProfile,
}

impl TierTable {
    pub fn get(&self, tier: TenantTier) -> &TierProfile {
        match tier {
            TenantTier::Free => &self.free,
            TenantTier::Pro => &self.pro,
            TenantTier::Enterprise => &self.ent,
        }
    }

    /// Base policy handed to a key on first sight.
    pub fn base_policy(&self, tier: TenantTier) -> Policy {
        let profile = self.get(tier);
        Policy::clamped(profile.base_rps, profile.base_burst)
    }

    /// Check that enterprise ≥ pro ≥ free at every decision point.
    pub fn check_ordering(&self) -> ConfigResult<()> {
        self.ordered("priority", |p| p.priority)?;
        self.ordered("preemptive.growth", |p| p.preemptive.growth)?;
        self.ordered("preemptive.surge", |p| p.preemptive.surge)?;
        self.ordered("preemptive.ddos", |p| p.preemptive.ddos)?;
        Ok(())
    }

    fn ordered(&self, name: &str, field: fn(&TierProfile) -> f64) -> ConfigResult<()> {
        let (free, pro, ent) = (field(&self.free), field(&self.pro), field(&self.ent));
        if ent >= pro && pro >= free {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "tier ordering violated for {name}: free={free} pro={pro} ent={ent}"
            )))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let api_keys = [
            ("free-key", TenantTier::Free),
            ("pro-key", TenantTier::Pro),
            ("ent-key", TenantTier::Enterprise),
        ]
        .into_iter()
        .map(|(k, t)| (k.to_string(), t))
        .collect();

        Self {
            port: 8080,
            oracle: OracleConfig::default(),
            control: ControlConfig::default(),
            governance: GovernanceConfig::default(),
            tiers: TierTable::default(),
            api_keys,
            resources: vec![
                "/api/v1/resourceA".to_string(),
                "/api/v1/resourceB".to_string(),
            ],
            max_keys: 1024,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            timeout_secs: 12.0,
            max_retries: 2,
        }
    }
}

impl OracleConfig {
    /// Per-attempt sub-timeout: the total budget split across attempts,
    /// never below one second.
    pub fn attempt_timeout(&self) -> Duration {
        let attempts = self.max_retries.max(1) as f64;
        Duration::from_secs_f64((self.timeout_secs / attempts).max(1.0))
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { interval_secs: 3.0 }
    }
}

impl ControlConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            large_change_factor: 1.8,
            pending_ttl_secs: 600,
            history_capacity: 1000,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            free: TierProfile {
                base_rps: 3.0,
                base_burst: 10,
                revenue_per_request: 0.01,
                priority: 1.0,
                preemptive: PreemptiveFactors {
                    growth: 1.4,
                    surge: 1.8,
                    ddos: 3.0,
                },
            },
            pro: TierProfile {
                base_rps: 8.0,
                base_burst: 20,
                revenue_per_request: 0.05,
                priority: 2.0,
                preemptive: PreemptiveFactors {
                    growth: 1.7,
                    surge: 2.5,
                    ddos: 5.0,
                },
            },
            ent: TierProfile {
                base_rps: 15.0,
                base_burst: 40,
                revenue_per_request: 0.20,
                priority: 5.0,
                preemptive: PreemptiveFactors {
                    growth: 2.2,
                    surge: 4.0,
                    ddos: 8.0,
                },
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay settings from the process environment.
    pub fn apply_process_env(&mut self) -> ConfigResult<()> {
        self.apply_env(|var| std::env::var(var).ok())
    }

    /// Overlay settings from an environment-style lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "PORT")? {
            self.port = v;
        }
        if let Some(v) = lookup("ORACLE_BASE_URL") {
            self.oracle.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("ORACLE_MODEL") {
            self.oracle.model = v;
        }
        if let Some(v) = parse_var(&lookup, "ORACLE_TIMEOUT_SEC")? {
            self.oracle.timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "ORACLE_MAX_RETRIES")? {
            self.oracle.max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "CONTROL_LOOP_EVERY_SEC")? {
            self.control.interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "DECISION_MIN_CONF")? {
            self.governance.min_confidence = v;
        }
        if let Some(v) = parse_var(&lookup, "LARGE_CHANGE_FACTOR")? {
            self.governance.large_change_factor = v;
        }
        if let Some(v) = parse_var(&lookup, "PENDING_TTL_SEC")? {
            self.governance.pending_ttl_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_KEYS")? {
            self.max_keys = v;
        }
        Ok(())
    }

    /// Reject settings the control plane cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let gov = &self.governance;
        if !(0.0..=1.0).contains(&gov.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence {} outside [0, 1]",
                gov.min_confidence
            )));
        }
        if !(gov.large_change_factor > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "large_change_factor {} must be greater than 1",
                gov.large_change_factor
            )));
        }
        if self.oracle.max_retries == 0 {
            return Err(ConfigError::Invalid("oracle.max_retries must be at least 1".into()));
        }
        check_secs("oracle.timeout_secs", self.oracle.timeout_secs)?;
        check_secs("control.interval_secs", self.control.interval_secs)?;
        if self.resources.is_empty() {
            return Err(ConfigError::Invalid("at least one resource is required".into()));
        }
        let needed = self.resources.len() * TenantTier::ALL.len();
        if self.max_keys < needed {
            return Err(ConfigError::Invalid(format!(
                "max_keys {} cannot hold {needed} tenant/resource pairs",
                self.max_keys
            )));
        }
        self.tiers.check_ordering()
    }
}

/// Longest timeout or interval accepted, in seconds.
pub const MAX_DURATION_SECS: f64 = 86_400.0;

fn check_secs(name: &str, value: f64) -> ConfigResult<()> {
    if value > 0.0 && value <= MAX_DURATION_SECS {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} {value} must be in (0, {MAX_DURATION_SECS}]"
        )))
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value: raw,
            }),
    }
}
