//! Worker registry and workload balancing
//!
//! Workers are opaque capability-tagged identities. The registry pairs every
//! load increment with exactly one decrement, whatever happens to the job.

pub mod capabilities;
pub mod registry;
pub mod worker;

pub use capabilities::{CapabilityTable, GENERIC_ROLE};
pub use registry::{AgentRegistry, AssignmentLease, WorkloadReport};
pub use worker::{CapabilityWorker, CommandTaskExecutor, Executor, NoopExecutor, Worker};
