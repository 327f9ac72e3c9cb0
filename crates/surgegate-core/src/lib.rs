//! surgegate-core — shared types and configuration for SurgeGate.
//!
//! Every other crate in the workspace speaks in terms of the types
//! defined here: tenant tiers, `(tenant, resource)` keys, the enforced
//! `Policy`, oracle actions, and the traffic scenario label.
//!
//! Configuration is a serde struct loaded from `surgegate.toml` and then
//! overlaid with environment variables. All fields have defaults, so an
//! empty file (or no file) yields a runnable configuration.

pub mod config;
pub mod error;
pub mod scenario;
pub mod types;

pub use config::{
    Config, ControlConfig, GovernanceConfig, OracleConfig, PreemptiveFactors, TierProfile,
    TierTable,
};
pub use error::{ConfigError, ConfigResult};
pub use scenario::Scenario;
pub use types::*;
