//! Worker and executor abstractions
//!
//! A worker is a capability-tagged identity. What it actually does with a
//! task is delegated to an injected [`Executor`], so process pools, RPC
//! backends or test doubles can be swapped without touching scheduling.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::WorkerSpec;
use crate::decomposer::{Task, WorkerBinding};
use crate::error::{OrchestratorError, Result};
use crate::external::{CommandExecutor, CommandRequest, CommandSpec};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Carries out one decomposed task on behalf of a worker
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Returns a short human-readable summary of what was done
    async fn execute(&self, job_id: &str, task: &Task) -> Result<String>;
}

pub trait Worker: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn capabilities(&self) -> &[String];
    /// `None` means unbounded
    fn max_concurrent(&self) -> Option<u32>;
    fn executor(&self) -> Arc<dyn Executor>;

    fn binding(&self) -> WorkerBinding {
        WorkerBinding {
            id: self.id().to_string(),
            capabilities: self.capabilities().to_vec(),
        }
    }
}

/// Logs the task and reports success
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

#[async_trait]
impl Executor for NoopExecutor {
    async fn execute(&self, job_id: &str, task: &Task) -> Result<String> {
        info!(job_id, task_id = %task.id, task = %task.title, "Task acknowledged");
        Ok(format!("{} acknowledged", task.id))
    }
}

/// Runs a shell command per task with the task exported as `TASK_*`/`JOB_*` variables
pub struct CommandTaskExecutor {
    command: String,
    runner: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl CommandTaskExecutor {
    pub fn new(command: impl Into<String>, runner: Arc<dyn CommandExecutor>) -> Self {
        Self {
            command: command.into(),
            runner,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn environment(job_id: &str, task: &Task) -> Vec<(String, String)> {
        vec![
            ("JOB_ID".into(), job_id.to_string()),
            ("TASK_ID".into(), task.id.clone()),
            ("TASK_TITLE".into(), task.title.clone()),
            ("TASK_TYPE".into(), task.task_type.to_string()),
            ("TASK_COMPLEXITY".into(), task.complexity.to_string()),
            ("TASK_HOURS".into(), task.estimated_hours.to_string()),
            ("TASK_ROLES".into(), task.roles.join(",")),
            ("TASK_WORKERS".into(), task.assigned_workers.join(",")),
        ]
    }
}

impl fmt::Debug for CommandTaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTaskExecutor")
            .field("command", &self.command)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Executor for CommandTaskExecutor {
    async fn execute(&self, job_id: &str, task: &Task) -> Result<String> {
        let request = CommandRequest::new(CommandSpec::parse(&self.command))
            .with_env(Self::environment(job_id, task))
            .with_timeout(self.timeout);

        let output = self
            .runner
            .execute(&request)
            .await
            .map_err(|e| OrchestratorError::execution(job_id, format!("{}: {e}", task.id)))?;

        if !output.success() {
            return Err(OrchestratorError::execution(
                job_id,
                format!(
                    "{} exited with status {}: {}",
                    task.id,
                    output.status_code,
                    output.stderr.trim()
                ),
            ));
        }
        Ok(output.stdout.trim().to_string())
    }
}

/// The standard worker: fixed tags, optional capacity, injected executor
#[derive(Clone)]
pub struct CapabilityWorker {
    id: String,
    capabilities: Vec<String>,
    max_concurrent: Option<u32>,
    executor: Arc<dyn Executor>,
}

impl CapabilityWorker {
    pub fn new<I, S>(id: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            max_concurrent: None,
            executor: Arc::new(NoopExecutor),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: Option<u32>) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Build a worker from the configured roster
    pub fn from_spec(spec: &WorkerSpec, runner: Arc<dyn CommandExecutor>) -> Self {
        let worker = Self::new(spec.id.clone(), spec.capabilities.iter().cloned())
            .with_max_concurrent(spec.max_concurrent);
        match &spec.command {
            Some(command) => {
                worker.with_executor(Arc::new(CommandTaskExecutor::new(command.clone(), runner)))
            }
            None => worker,
        }
    }
}

impl fmt::Debug for CapabilityWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityWorker")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl Worker for CapabilityWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn max_concurrent(&self) -> Option<u32> {
        self.max_concurrent
    }

    fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposer::TaskType;
    use crate::external::command::{CommandOutput, MockCommandExecutor};

    fn task() -> Task {
        Task {
            id: "backend.1#2".into(),
            title: "Business Logic".into(),
            task_type: TaskType::Implementation,
            complexity: 3,
            estimated_hours: 6.0,
            subtasks: Vec::new(),
            roles: vec!["developer".into(), "backend-developer".into()],
            assigned_workers: vec!["agent001".into()],
            lead_worker: Some("agent001".into()),
            depends_on: Vec::new(),
        }
    }

    fn output(code: i32) -> CommandOutput {
        CommandOutput {
            status_code: code,
            stdout: "done\n".into(),
            stderr: "broken".into(),
            duration: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_command_executor_exports_task() {
        let mut runner = MockCommandExecutor::new();
        runner
            .expect_execute()
            .withf(|request| {
                request.env.iter().any(|(k, v)| k == "TASK_ID" && v == "backend.1#2")
                    && request.env.iter().any(|(k, v)| k == "JOB_ID" && v == "backend.1")
                    && request.env.iter().any(|(k, v)| k == "TASK_ROLES" && v == "developer,backend-developer")
            })
            .times(1)
            .returning(|_| Ok(output(0)));

        let executor = CommandTaskExecutor::new("./run-task.sh", Arc::new(runner));
        let summary = executor.execute("backend.1", &task()).await.unwrap();
        assert_eq!(summary, "done");
    }

    #[tokio::test]
    async fn test_command_failure_is_execution_error() {
        let mut runner = MockCommandExecutor::new();
        runner.expect_execute().returning(|_| Ok(output(1)));

        let executor = CommandTaskExecutor::new("false", Arc::new(runner));
        let err = executor.execute("backend.1", &task()).await.unwrap_err();
        assert_eq!(err.kind(), "execution");
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_worker_from_spec() {
        let spec = WorkerSpec {
            id: "agent007".into(),
            capabilities: vec!["security-auditor".into()],
            max_concurrent: Some(2),
            command: None,
        };
        let worker = CapabilityWorker::from_spec(&spec, Arc::new(MockCommandExecutor::new()));
        assert_eq!(worker.id(), "agent007");
        assert_eq!(worker.max_concurrent(), Some(2));
        assert_eq!(worker.binding().capabilities, vec!["security-auditor"]);
    }
}
