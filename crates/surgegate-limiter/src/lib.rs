//! surgegate-limiter — the latency-critical admission path.
//!
//! Holds the authoritative policy for every `(tenant, resource)` key
//! together with that key's token bucket and usage window.
//!
//! # Architecture
//!
//! ```text
//! AdmissionGate::check(api_key, resource)
//!   ├── TenantDirectory → tier (401 on unknown key)
//!   └── PolicyStore::admit(tier, resource)
//!         └── DashMap<PairKey, Mutex<KeySlot>>
//!               ├── Policy       ← written by the decision engine
//!               ├── TokenBucket  ← refilled lazily per call
//!               └── UsageWindow  ← drained by the control loop
//! ```
//!
//! Each key has its own mutex, so admission on one key never waits on a
//! policy change or a window drain for another key.

pub mod bucket;
pub mod error;
pub mod gate;
pub mod store;
pub mod usage;

pub use bucket::TokenBucket;
pub use error::{AdmissionError, AdmissionResult};
pub use gate::{AdmissionGate, TenantDirectory};
pub use store::{KeyView, PolicyStore};
pub use usage::{UsageWindow, WindowSample};
