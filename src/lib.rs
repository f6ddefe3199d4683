// Feature Orchestrator Library - capability-aware feature delivery
// This exposes the core components for testing and integration

pub mod agents;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod decomposer;
pub mod error;
pub mod external;
pub mod hooks;
pub mod observability;
pub mod scheduler;
pub mod telemetry;

// Re-export key types for easy access
pub use agents::{AgentRegistry, AssignmentLease, CapabilityTable, CapabilityWorker, Executor, Worker, WorkloadReport};
pub use cache::{CacheStats, TtlCache};
pub use config::OrchestratorConfig;
pub use context::OrchestrationContext;
pub use decomposer::{Decomposition, JobId, Task, TaskDecomposer, TaskType};
pub use error::{OrchestratorError, Result};
pub use hooks::{ConsensusValidator, HookInvocation, HookRunner, HookType, ReviewerPolicy};
pub use observability::{OperationTimer, RunMetrics};
pub use scheduler::{
    BatchScheduler, DelegatingOperation, FnOperation, Job, JobOperation, JobStatus, OperationKind, RunOptions,
    SchedulerReport, Strategy,
};
pub use telemetry::{create_scheduling_span, generate_correlation_id, init_telemetry};
