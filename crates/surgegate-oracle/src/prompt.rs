//! What the oracle is told about a key.

use serde::Serialize;

use surgegate_core::{PairKey, Policy, Scenario, TenantTier};

/// One window's worth of observations for a single key.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub tenant: TenantTier,
    pub resource: String,
    /// Enforced limit during the window.
    pub current_rps: f64,
    pub current_burst: u32,
    pub observed_rps: f64,
    pub blocked_ratio: f64,
    pub utilization: f64,
    pub scenario: Scenario,
    pub revenue_per_request: f64,
}

impl OracleRequest {
    pub fn new(
        key: &PairKey,
        policy: Policy,
        observed_rps: f64,
        blocked_ratio: f64,
        revenue_per_request: f64,
    ) -> Self {
        let utilization = observed_rps / policy.rps;
        Self {
            tenant: key.tenant,
            resource: key.resource.clone(),
            current_rps: policy.rps,
            current_burst: policy.burst,
            observed_rps,
            blocked_ratio,
            utilization,
            scenario: Scenario::classify(observed_rps, blocked_ratio, utilization),
            revenue_per_request,
        }
    }

    pub fn current_policy(&self) -> Policy {
        Policy {
            rps: self.current_rps,
            burst: self.current_burst,
        }
    }

    /// Render the instruction text sent to the model.
    pub fn prompt(&self) -> String {
        format!(
            r#"You are a rate limit advisor. Analyze this traffic and return ONLY valid JSON.

CUSTOMER: {tenant}
RESOURCE: {resource}
REVENUE: ${revenue:.3} per request
CURRENT LIMIT: {current:.1} RPS
ACTUAL TRAFFIC: {observed:.2} RPS
UTILIZATION: {utilization:.1}%
BLOCKED: {blocked:.1}%
SCENARIO: {scenario}

RULES:
- Enterprise customers: scale aggressively (up to 100 RPS)
- Pro customers: scale moderately (up to 50 RPS)
- Free customers: scale conservatively (up to 15 RPS)
- If utilization > 80%: scale up
- If utilization < 30%: scale down or maintain
- If blocked ratio > 20%: scale up immediately

Return ONLY this JSON format:
{{"action": "up", "new_rps": 25.0, "new_burst": 75, "confidence": 0.85, "reason": "{scenario}_scaling_needed"}}"#,
            tenant = self.tenant.as_str().to_ascii_uppercase(),
            resource = self.resource,
            revenue = self.revenue_per_request,
            current = self.current_rps,
            observed = self.observed_rps,
            utilization = self.utilization * 100.0,
            blocked = self.blocked_ratio * 100.0,
            scenario = self.scenario,
        )
    }
}
