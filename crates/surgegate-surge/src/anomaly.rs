//! Deviation of observed traffic from the enforced baseline.

/// Score in `[0, 1]`; zero unless traffic is both present and well above
/// the baseline (more than double it and at least 1.5× it).
pub fn anomaly_score(baseline_rps: f64, observed_rps: f64) -> f64 {
    if baseline_rps <= 0.0 || observed_rps <= 1.0 {
        return 0.0;
    }
    let deviation = (observed_rps - baseline_rps).abs() / baseline_rps;
    if deviation > 1.0 && observed_rps > baseline_rps * 1.5 {
        (deviation / 3.0).min(1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_traffic_is_not_anomalous() {
        assert_eq!(anomaly_score(10.0, 0.5), 0.0);
        assert_eq!(anomaly_score(10.0, 15.0), 0.0);
        assert_eq!(anomaly_score(0.0, 100.0), 0.0);
    }

    #[test]
    fn drop_in_traffic_is_not_anomalous() {
        assert_eq!(anomaly_score(100.0, 2.0), 0.0);
    }

    #[test]
    fn spike_scales_with_deviation() {
        assert_eq!(anomaly_score(10.0, 25.0), 0.5);
        assert_eq!(anomaly_score(10.0, 100.0), 1.0);
    }
}
