//! surgegate-surge — early warning from the shape of recent traffic.
//!
//! The predictor keeps a five-minute trail of observed rates per key and
//! turns the recent slope into a surge probability. A high enough
//! probability yields a preemptive [`ScaleProposal`] that is resolved ahead
//! of (and instead of) the oracle for that cycle.

pub mod anomaly;
pub mod predictor;
pub mod preempt;

pub use anomaly::anomaly_score;
pub use predictor::{SurgeBand, SurgePredictor, SurgeSignal};
pub use preempt::{ScaleProposal, propose};
