use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::job::Job;
use crate::agents::Worker;
use crate::decomposer::{Decomposition, TaskType};
use crate::error::{OrchestratorError, Result};
use crate::hooks::HookType;

/// The unit of work the scheduler drives for every job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Start,
    Scaffold,
    Decompose,
    Review,
}

impl OperationKind {
    /// Lifecycle points wrapped around the operation
    pub fn hooks(self) -> Option<(HookType, HookType)> {
        match self {
            OperationKind::Start => Some((HookType::PreStart, HookType::PostStart)),
            OperationKind::Scaffold => Some((HookType::PreScaffold, HookType::PostScaffold)),
            OperationKind::Review => Some((HookType::PreAgentReview, HookType::PostAgentReview)),
            OperationKind::Decompose => None,
        }
    }

    /// Which decomposed tasks the operation dispatches to workers
    pub fn covers(self, task_type: TaskType) -> bool {
        match self {
            OperationKind::Start => true,
            OperationKind::Scaffold => task_type.is_planning(),
            OperationKind::Review => matches!(task_type, TaskType::Review | TaskType::Testing),
            OperationKind::Decompose => false,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Start => write!(f, "start"),
            OperationKind::Scaffold => write!(f, "scaffold"),
            OperationKind::Decompose => write!(f, "decompose"),
            OperationKind::Review => write!(f, "review"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(OperationKind::Start),
            "scaffold" => Ok(OperationKind::Scaffold),
            "decompose" => Ok(OperationKind::Decompose),
            "review" => Ok(OperationKind::Review),
            other => Err(OrchestratorError::validation(format!(
                "unknown operation '{other}' (expected start, scaffold, decompose or review)"
            ))),
        }
    }
}

/// Everything an operation gets for one job
pub struct OperationRequest<'a> {
    pub kind: OperationKind,
    pub job: &'a Job,
    /// Decomposition with workers already bound to tasks
    pub plan: &'a Decomposition,
    pub workers: &'a [Arc<dyn Worker>],
}

#[async_trait]
pub trait JobOperation: Send + Sync {
    /// Returns a short summary for the report
    async fn run(&self, request: &OperationRequest<'_>) -> Result<String>;
}

/// Hands each covered task to its lead worker's executor, in dependency order
#[derive(Debug, Default, Clone, Copy)]
pub struct DelegatingOperation;

#[async_trait]
impl JobOperation for DelegatingOperation {
    async fn run(&self, request: &OperationRequest<'_>) -> Result<String> {
        let job_id = request.job.id.as_str();
        let mut completed = 0usize;

        for task in request.plan.execution_order()? {
            if !request.kind.covers(task.task_type) {
                continue;
            }
            let lead = task
                .lead_worker
                .as_deref()
                .and_then(|id| request.workers.iter().find(|w| w.id() == id))
                .ok_or_else(|| {
                    OrchestratorError::execution(job_id, format!("no worker bound to {}", task.id))
                })?;

            debug!(job_id, task_id = %task.id, worker_id = lead.id(), "Dispatching task");
            lead.executor().execute(job_id, task).await?;
            completed += 1;
        }

        Ok(format!("{} {completed} task(s)", request.kind))
    }
}

/// Adapts an async closure into an operation
pub struct FnOperation<F> {
    f: F,
}

impl<F> FnOperation<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(Job, OperationKind) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> JobOperation for FnOperation<F>
where
    F: Fn(Job, OperationKind) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn run(&self, request: &OperationRequest<'_>) -> Result<String> {
        (self.f)(request.job.clone(), request.kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::worker::MockExecutor;
    use crate::agents::{CapabilityTable, CapabilityWorker};
    use crate::config::DecomposerConfig;
    use crate::decomposer::TaskDecomposer;

    fn plan(job: &Job, workers: &[Arc<dyn Worker>]) -> Decomposition {
        let decomposer =
            TaskDecomposer::new(CapabilityTable::from_defaults(), DecomposerConfig::default()).unwrap();
        let mut plan = decomposer.decompose(&job.id, None).unwrap();
        plan.bind_workers(&workers.iter().map(|w| w.binding()).collect::<Vec<_>>());
        plan
    }

    #[test]
    fn test_operation_hooks_and_coverage() {
        assert_eq!(
            OperationKind::Review.hooks(),
            Some((HookType::PreAgentReview, HookType::PostAgentReview))
        );
        assert_eq!(OperationKind::Decompose.hooks(), None);
        assert!(OperationKind::Scaffold.covers(TaskType::Design));
        assert!(!OperationKind::Scaffold.covers(TaskType::Implementation));
        assert!(OperationKind::Review.covers(TaskType::Testing));
        assert_eq!("SCAFFOLD".parse::<OperationKind>().unwrap(), OperationKind::Scaffold);
        assert!("deploy".parse::<OperationKind>().is_err());
    }

    #[tokio::test]
    async fn test_delegating_runs_covered_tasks_in_order() {
        let mut executor = MockExecutor::new();
        let mut seq = mockall::Sequence::new();
        for expected in ["security.1#1", "security.1#2", "security.1#3", "security.1#4"] {
            executor
                .expect_execute()
                .withf(move |_, task| task.id == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, task| Ok(task.id.clone()));
        }

        let worker: Arc<dyn Worker> = Arc::new(
            CapabilityWorker::new("agent001", ["security-auditor"]).with_executor(Arc::new(executor)),
        );
        let workers = vec![worker];
        let job = Job::new("security.1");
        let plan = plan(&job, &workers);

        let request = OperationRequest {
            kind: OperationKind::Start,
            job: &job,
            plan: &plan,
            workers: &workers,
        };
        let summary = DelegatingOperation.run(&request).await.unwrap();
        assert_eq!(summary, "start 4 task(s)");
    }

    #[tokio::test]
    async fn test_review_skips_build_tasks() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().times(2).returning(|_, _| Ok(String::new()));

        let worker: Arc<dyn Worker> =
            Arc::new(CapabilityWorker::new("agent001", ["developer"]).with_executor(Arc::new(executor)));
        let workers = vec![worker];
        let job = Job::new("frontend.1");
        let plan = plan(&job, &workers);

        let request = OperationRequest {
            kind: OperationKind::Review,
            job: &job,
            plan: &plan,
            workers: &workers,
        };
        assert_eq!(DelegatingOperation.run(&request).await.unwrap(), "review 2 task(s)");
    }

    #[tokio::test]
    async fn test_task_failure_fails_operation() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .returning(|job_id, _| Err(OrchestratorError::execution(job_id, "compile error")));

        let worker: Arc<dyn Worker> =
            Arc::new(CapabilityWorker::new("agent001", ["developer"]).with_executor(Arc::new(executor)));
        let workers = vec![worker];
        let job = Job::new("backend.1");
        let plan = plan(&job, &workers);

        let request = OperationRequest {
            kind: OperationKind::Start,
            job: &job,
            plan: &plan,
            workers: &workers,
        };
        let err = DelegatingOperation.run(&request).await.unwrap_err();
        assert_eq!(err.kind(), "execution");
    }

    #[tokio::test]
    async fn test_fn_operation() {
        let op = FnOperation::new(|job: Job, kind: OperationKind| async move { Ok(format!("{kind} {}", job.id)) });
        let job = Job::new("ai.1");
        let workers: Vec<Arc<dyn Worker>> = Vec::new();
        let plan = plan(&job, &workers);
        let request = OperationRequest {
            kind: OperationKind::Scaffold,
            job: &job,
            plan: &plan,
            workers: &workers,
        };
        assert_eq!(op.run(&request).await.unwrap(), "scaffold ai.1");
    }
}
