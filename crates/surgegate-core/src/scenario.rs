//! Coarse traffic scenario classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label derived from a window's utilization and blocked ratio. Selects how
/// aggressively a scaling proposal should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Light,
    Normal,
    Surge,
    Ddos,
    Stable,
}

impl Scenario {
    /// Classify one window of traffic. Checks run most-severe first.
    pub fn classify(ok_rps: f64, blocked_ratio: f64, utilization: f64) -> Self {
        if ok_rps > 50.0 || (utilization > 2.0 && blocked_ratio > 0.6) {
            Scenario::Ddos
        } else if utilization > 0.8 && blocked_ratio > 0.3 {
            Scenario::Surge
        } else if utilization > 0.6 && blocked_ratio < 0.3 {
            Scenario::Normal
        } else if utilization < 0.3 {
            Scenario::Light
        } else {
            Scenario::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Light => "light",
            Scenario::Normal => "normal",
            Scenario::Surge => "surge",
            Scenario::Ddos => "ddos",
            Scenario::Stable => "stable",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
