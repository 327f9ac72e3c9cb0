//! surgegate-oracle — talking to the external scaling advisor.
//!
//! The oracle is untrusted. Its free-text reply goes through three stages
//! before anything can touch a policy:
//!
//! 1. [`extract_decision`] pulls the first well-formed decision object out
//!    of the text, failing closed on anything else.
//! 2. On the final attempt only, [`extract_intent`] may recover a bare
//!    direction from the prose. The result is tagged
//!    [`DecisionSource::IntentExtracted`](surgegate_core::DecisionSource)
//!    and carries the confidence floor.
//! 3. [`validate`] range-checks every field and rejects the whole decision
//!    if any one is out of bounds.
//!
//! [`consult`] drives the retry/timeout budget around a [`DecisionOracle`].

pub mod client;
pub mod consult;
pub mod error;
pub mod extract;
pub mod prompt;
pub mod validate;

pub use client::{DecisionOracle, HttpOracle, OracleFuture};
pub use consult::{OracleVerdict, RetryPolicy, consult};
pub use error::{OracleError, OracleResult};
pub use extract::{RawDecision, extract_decision, extract_intent};
pub use prompt::OracleRequest;
pub use validate::{ValidatedDecision, validate};
