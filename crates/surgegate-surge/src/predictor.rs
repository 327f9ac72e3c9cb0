//! Trend analysis over a trailing window of observed rates.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use surgegate_core::PairKey;

/// Samples older than this are discarded.
pub const HISTORY_HORIZON: Duration = Duration::from_secs(300);

/// Number of most recent samples the trend is computed over.
const TREND_SAMPLES: usize = 3;

/// Severity band a trend falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgeBand {
    Growth,
    Surge,
    Ddos,
}

impl SurgeBand {
    /// Label used for preemptive scaling reasons.
    pub fn scaling_label(&self) -> &'static str {
        match self {
            SurgeBand::Growth => "growth_scaling",
            SurgeBand::Surge => "surge_scaling",
            SurgeBand::Ddos => "ddos_protection",
        }
    }
}

impl fmt::Display for SurgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SurgeBand::Growth => "growth",
            SurgeBand::Surge => "surge",
            SurgeBand::Ddos => "ddos",
        })
    }
}

/// Output of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurgeSignal {
    /// Surge probability in percent, `0..=100`.
    pub probability: f64,
    /// Average change in observed rate per sample over the last samples.
    pub trend: f64,
    pub predicted_peak: f64,
    pub band: Option<SurgeBand>,
}

impl SurgeSignal {
    pub fn quiet(observed_rps: f64) -> Self {
        Self {
            probability: 0.0,
            trend: 0.0,
            predicted_peak: observed_rps,
            band: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    rps: f64,
}

/// Per-key trailing history of observed rates.
#[derive(Debug, Default)]
pub struct SurgePredictor {
    history: HashMap<PairKey, VecDeque<Sample>>,
}

impl SurgePredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `observed_rps` for `key` and score the resulting trail.
    ///
    /// `priority` is the tenant's business priority; it scales the base
    /// probability by `0.8 + 0.15 × priority`.
    pub fn analyze(&mut self, key: &PairKey, priority: f64, observed_rps: f64, now: Instant) -> SurgeSignal {
        let trail = self.history.entry(key.clone()).or_default();
        trail.push_back(Sample { at: now, rps: observed_rps });
        while let Some(front) = trail.front() {
            if now.saturating_duration_since(front.at) >= HISTORY_HORIZON {
                trail.pop_front();
            } else {
                break;
            }
        }

        if trail.len() < 2 {
            return SurgeSignal::quiet(observed_rps);
        }

        let recent: Vec<f64> = trail
            .iter()
            .rev()
            .take(TREND_SAMPLES)
            .map(|s| s.rps)
            .collect();
        // `recent` is newest first.
        let trend = (recent[0] - recent[recent.len() - 1]) / recent.len() as f64;

        let (band, base, extrapolation) = if (0.2..=2.0).contains(&trend) {
            (Some(SurgeBand::Growth), (10.0 + trend * 8.0).min(30.0), trend * 2.0)
        } else if trend > 2.0 && trend <= 10.0 {
            (Some(SurgeBand::Surge), (30.0 + trend * 5.0).min(70.0), trend * 3.0)
        } else if trend > 10.0 || observed_rps > 50.0 {
            (Some(SurgeBand::Ddos), (70.0 + trend.min(30.0)).min(100.0), trend * 4.0)
        } else {
            (None, 0.0, 0.0)
        };

        let probability = (base * (0.8 + priority * 0.15)).clamp(0.0, 100.0);
        let signal = SurgeSignal {
            probability,
            trend,
            predicted_peak: observed_rps.max(observed_rps + extrapolation),
            band,
        };
        debug!(
            %key,
            observed_rps,
            trend,
            probability,
            samples = trail.len(),
            "surge analysis"
        );
        signal
    }

    /// Latest sample count for a key, for reporting.
    pub fn samples(&self, key: &PairKey) -> usize {
        self.history.get(key).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surgegate_core::TenantTier;

    fn key() -> PairKey {
        PairKey::new(TenantTier::Free, "/api/v1/resourceA")
    }

    /// Feed `rates` three seconds apart and return the last signal.
    fn feed(predictor: &mut SurgePredictor, priority: f64, rates: &[f64]) -> SurgeSignal {
        let start = Instant::now();
        let mut last = SurgeSignal::quiet(0.0);
        for (i, rps) in rates.iter().enumerate() {
            last = predictor.analyze(&key(), priority, *rps, start + Duration::from_secs(3 * i as u64));
        }
        last
    }

    #[test]
    fn single_sample_is_quiet() {
        let mut p = SurgePredictor::new();
        let signal = feed(&mut p, 1.0, &[40.0]);
        assert_eq!(signal, SurgeSignal::quiet(40.0));
    }

    #[test]
    fn flat_traffic_has_no_band() {
        let mut p = SurgePredictor::new();
        let signal = feed(&mut p, 1.0, &[5.0, 5.0, 5.0]);
        assert_eq!(signal.trend, 0.0);
        assert_eq!(signal.probability, 0.0);
        assert_eq!(signal.band, None);
    }

    #[test]
    fn gradual_growth_band() {
        let mut p = SurgePredictor::new();
        // trend = (6 - 3) / 3 = 1.0 → base 18, priority 1 → ×0.95
        let signal = feed(&mut p, 1.0, &[3.0, 4.5, 6.0]);
        assert_eq!(signal.band, Some(SurgeBand::Growth));
        assert!((signal.trend - 1.0).abs() < 1e-9);
        assert!((signal.probability - 17.1).abs() < 1e-9);
        assert!((signal.predicted_peak - 8.0).abs() < 1e-9);
    }

    #[test]
    fn moderate_surge_band() {
        let mut p = SurgePredictor::new();
        // trend = (20 - 5) / 3 = 5 → base 55
        let signal = feed(&mut p, 2.0, &[5.0, 12.0, 20.0]);
        assert_eq!(signal.band, Some(SurgeBand::Surge));
        assert!((signal.probability - 55.0 * 1.1).abs() < 1e-9);
        assert!((signal.predicted_peak - 35.0).abs() < 1e-9);
    }

    #[test]
    fn ddos_band_caps_at_hundred() {
        let mut p = SurgePredictor::new();
        let signal = feed(&mut p, 5.0, &[5.0, 60.0, 120.0]);
        assert_eq!(signal.band, Some(SurgeBand::Ddos));
        assert_eq!(signal.probability, 100.0);
    }

    #[test]
    fn high_volume_without_growth_is_ddos() {
        let mut p = SurgePredictor::new();
        let signal = feed(&mut p, 1.0, &[80.0, 80.0]);
        assert_eq!(signal.band, Some(SurgeBand::Ddos));
        assert!((signal.probability - 70.0 * 0.95).abs() < 1e-9);
        assert_eq!(signal.predicted_peak, 80.0);
    }

    #[test]
    fn trend_uses_last_three_samples() {
        let mut p = SurgePredictor::new();
        let signal = feed(&mut p, 1.0, &[0.0, 100.0, 10.0, 10.0, 10.0]);
        assert_eq!(signal.trend, 0.0);
    }

    #[test]
    fn falling_traffic_has_no_band() {
        let mut p = SurgePredictor::new();
        let signal = feed(&mut p, 1.0, &[30.0, 20.0, 10.0]);
        assert!(signal.trend < 0.0);
        assert_eq!(signal.probability, 0.0);
        assert_eq!(signal.predicted_peak, 10.0);
    }

    #[test]
    fn old_samples_are_pruned() {
        let mut p = SurgePredictor::new();
        let start = Instant::now();
        p.analyze(&key(), 1.0, 1.0, start);
        let signal = p.analyze(&key(), 1.0, 20.0, start + Duration::from_secs(301));
        assert_eq!(p.samples(&key()), 1);
        assert_eq!(signal.probability, 0.0);
    }

    #[test]
    fn probability_non_decreasing_within_band() {
        let bands = [(0.2, 2.0), (2.01, 10.0), (10.01, 60.0)];
        for (lo, hi) in bands {
            let mut previous = -1.0;
            let mut trend = lo;
            while trend <= hi {
                let mut p = SurgePredictor::new();
                // Two samples: trend = delta / 2.
                let signal = feed(&mut p, 2.0, &[1.0, 1.0 + trend * 2.0]);
                assert!(signal.probability >= previous, "trend {trend}");
                previous = signal.probability;
                trend += 0.25;
            }
        }
    }
}
