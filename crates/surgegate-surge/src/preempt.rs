//! Preemptive scale-up proposals from a surge signal.

use serde::Serialize;
use tracing::{debug, warn};

use surgegate_core::{PairKey, Policy, TierProfile};

use crate::predictor::{SurgeBand, SurgeSignal};

/// Below this probability (percent) no proposal is made.
pub const PROPOSAL_THRESHOLD: f64 = 25.0;

const MAX_RPS: f64 = 500.0;
const MAX_BURST: f64 = 2000.0;

/// A scale-up the control loop resolves in place of consulting the oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleProposal {
    pub band: SurgeBand,
    pub factor: f64,
    pub new_rps: f64,
    pub new_burst: u32,
    /// Synthetic confidence, at least 0.88.
    pub confidence: f64,
    pub reason: String,
}

/// Turn a signal into a proposal for `key`, or `None` below threshold.
///
/// The band is chosen from the probability: DDoS protection at 80% or a
/// trend above 15, surge scaling at 50%, growth otherwise. The factor comes
/// from the tenant profile for that band.
///
/// A proposal never lowers either limit. A key already at or above both
/// caps gets no proposal.
pub fn propose(key: &PairKey, profile: &TierProfile, current: Policy, signal: &SurgeSignal) -> Option<ScaleProposal> {
    let probability = signal.probability;
    if probability < PROPOSAL_THRESHOLD {
        return None;
    }

    let band = if probability >= 80.0 || signal.trend > 15.0 {
        SurgeBand::Ddos
    } else if probability >= 50.0 {
        SurgeBand::Surge
    } else {
        SurgeBand::Growth
    };
    let factor = match band {
        SurgeBand::Growth => profile.preemptive.growth,
        SurgeBand::Surge => profile.preemptive.surge,
        SurgeBand::Ddos => profile.preemptive.ddos,
    };

    let new_rps = (current.rps * factor).min(MAX_RPS).max(current.rps);
    let new_burst = ((current.burst as f64 * factor).min(MAX_BURST).trunc() as u32).max(current.burst);
    if new_rps <= current.rps && new_burst <= current.burst {
        debug!(%key, rps = current.rps, burst = current.burst, "already above preemptive caps");
        return None;
    }
    let proposal = ScaleProposal {
        band,
        factor,
        new_rps,
        new_burst,
        confidence: (0.88 + probability / 500.0).min(1.0),
        reason: format!("{}_{:.0}pct", band.scaling_label(), probability),
    };

    warn!(
        %key,
        band = %band,
        probability,
        factor,
        new_rps,
        "preemptive scaling proposed"
    );
    Some(proposal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use surgegate_core::{TenantTier, TierTable};

    fn signal(probability: f64, trend: f64) -> SurgeSignal {
        SurgeSignal {
            probability,
            trend,
            predicted_peak: 0.0,
            band: None,
        }
    }

    fn key(tier: TenantTier) -> PairKey {
        PairKey::new(tier, "/api/v1/resourceA")
    }

    #[test]
    fn nothing_below_threshold() {
        let tiers = TierTable::default();
        let current = Policy { rps: 10.0, burst: 30 };
        assert_eq!(propose(&key(TenantTier::Free), &tiers.free, current, &signal(24.9, 1.0)), None);
    }

    #[test]
    fn growth_band_uses_growth_factor() {
        let tiers = TierTable::default();
        let current = Policy { rps: 10.0, burst: 30 };
        let p = propose(&key(TenantTier::Pro), &tiers.pro, current, &signal(30.0, 1.0)).unwrap();
        assert_eq!(p.band, SurgeBand::Growth);
        assert_eq!(p.factor, 1.7);
        assert_eq!(p.new_rps, 17.0);
        assert_eq!(p.new_burst, 51);
        assert_eq!(p.reason, "growth_scaling_30pct");
        assert!((p.confidence - 0.94).abs() < 1e-9);
    }

    #[test]
    fn steep_trend_forces_ddos_band() {
        let tiers = TierTable::default();
        let current = Policy { rps: 3.0, burst: 10 };
        let p = propose(&key(TenantTier::Free), &tiers.free, current, &signal(40.0, 16.0)).unwrap();
        assert_eq!(p.band, SurgeBand::Ddos);
        assert_eq!(p.new_rps, 9.0);
        assert_eq!(p.new_burst, 30);
    }

    #[test]
    fn enterprise_ddos_is_capped() {
        let tiers = TierTable::default();
        let current = Policy { rps: 100.0, burst: 300 };
        let p = propose(&key(TenantTier::Enterprise), &tiers.ent, current, &signal(100.0, 40.0)).unwrap();
        assert_eq!(p.factor, 8.0);
        assert_eq!(p.new_rps, 500.0);
        assert_eq!(p.new_burst, 2000);
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.reason, "ddos_protection_100pct");
    }

    #[test]
    fn limits_above_caps_are_never_cut() {
        let tiers = TierTable::default();
        let key = key(TenantTier::Enterprise);

        let high = Policy { rps: 800.0, burst: 2400 };
        assert_eq!(propose(&key, &tiers.ent, high, &signal(95.0, 40.0)), None);

        let rps_only = Policy { rps: 800.0, burst: 100 };
        let p = propose(&key, &tiers.ent, rps_only, &signal(95.0, 40.0)).unwrap();
        assert_eq!(p.new_rps, 800.0);
        assert_eq!(p.new_burst, 800);

        let near_cap = Policy { rps: 400.0, burst: 1500 };
        let p = propose(&key, &tiers.ent, near_cap, &signal(95.0, 40.0)).unwrap();
        assert_eq!(p.new_rps, 500.0);
        assert_eq!(p.new_burst, 2000);
    }

    #[test]
    fn enterprise_factors_dominate_at_every_band() {
        let tiers = TierTable::default();
        let current = Policy { rps: 10.0, burst: 30 };
        for probability in [30.0, 60.0, 90.0] {
            let s = signal(probability, 1.0);
            let free = propose(&key(TenantTier::Free), &tiers.free, current, &s).unwrap();
            let pro = propose(&key(TenantTier::Pro), &tiers.pro, current, &s).unwrap();
            let ent = propose(&key(TenantTier::Enterprise), &tiers.ent, current, &s).unwrap();
            assert!(ent.new_rps > pro.new_rps && pro.new_rps > free.new_rps);
        }
    }
}
