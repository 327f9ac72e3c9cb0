//! surgegate-control — the slow half of the system.
//!
//! Every period the loop drains each key's usage window, scores the trend,
//! and either resolves a preemptive scale-up or asks the oracle for advice.
//! Oracle calls are made with no shared lock held, so admission keeps
//! running at full speed while the loop waits.

pub mod control;
pub mod insight;

pub use control::{ControlLoop, CycleOutcome, CycleReport};
pub use insight::{InsightBoard, KeyInsight};
