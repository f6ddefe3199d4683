//! Lifecycle hooks
//!
//! External commands bound to lifecycle points, their execution context, a
//! bounded invocation history, and reviewer consensus for gated points.

pub mod consensus;
pub mod context;
pub mod history;
pub mod runner;
pub mod types;

pub use consensus::{
    ApproveAll, ConsensusResult, ConsensusValidator, RandomReviewerPolicy, ReviewRequest,
    ReviewerPolicy, ReviewerVerdict, ScriptedReviewerPolicy, Verdict,
};
pub use context::HookContext;
pub use history::{HookHistory, HookInvocation, HookOutcome, HookStats};
pub use runner::HookRunner;
pub use types::HookType;
