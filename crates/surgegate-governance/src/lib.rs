//! surgegate-governance — deciding whether a proposed policy change lands.
//!
//! A proposal is applied immediately when it is confident enough and
//! small enough; otherwise it waits in the approval queue until an
//! operator approves or rejects it, a newer proposal for the same key
//! supersedes it, or it expires.
//!
//! ```text
//!            ┌── confident & small ──▶ applied ──▶ history
//! proposed ──┤
//!            └── otherwise ──▶ pending ──┬── approve ──▶ applied ──▶ history
//!                                        ├── reject / supersede / expire ──▶ discarded
//! ```

pub mod engine;
pub mod error;
pub mod types;

pub use engine::DecisionEngine;
pub use error::{GovernanceError, GovernanceResult};
pub use types::{
    ApplyMode, DecisionProposal, DecisionRecord, HistoryPage, PendingDecision, QueueReason,
    Resolution,
};
