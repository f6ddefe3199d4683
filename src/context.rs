//! Process-wide orchestration state
//!
//! Built once at startup and passed by reference to every component. Tests
//! build as many isolated instances as they like.

use std::sync::Arc;
use tracing::info;

use crate::agents::{AgentRegistry, CapabilityTable, CapabilityWorker, Worker};
use crate::cache::TtlCache;
use crate::config::OrchestratorConfig;
use crate::decomposer::{Decomposition, TaskDecomposer};
use crate::error::Result;
use crate::external::{CommandExecutor, ProcessCommandExecutor};
use crate::hooks::consensus::policy_from_config;
use crate::hooks::{HookRunner, ReviewerPolicy};
use crate::observability::RunMetrics;
use crate::scheduler::{BatchScheduler, RunOptions};

pub const DECOMPOSITION_NAMESPACE: &str = "decomposition";

pub struct OrchestrationContext {
    config: Arc<OrchestratorConfig>,
    registry: Arc<AgentRegistry>,
    decomposer: Arc<TaskDecomposer>,
    cache: Arc<TtlCache>,
    hooks: Arc<HookRunner>,
    metrics: Arc<RunMetrics>,
}

impl OrchestrationContext {
    /// Context with real process execution and the configured reviewer policy
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: OrchestratorConfig) -> OrchestrationContextBuilder {
        OrchestrationContextBuilder {
            config,
            command_executor: None,
            reviewer_policy: None,
            register_configured_workers: true,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn decomposer(&self) -> &TaskDecomposer {
        &self.decomposer
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn hooks(&self) -> &Arc<HookRunner> {
        &self.hooks
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    pub fn register_worker(&self, worker: Arc<dyn Worker>) -> Result<()> {
        self.registry.register(worker)
    }

    /// Decompose through the cache; ids and hints are validated first so
    /// malformed input surfaces as a validation error, not a producer failure
    pub async fn decompose(&self, job_id: &str, complexity_hint: Option<u8>) -> Result<Decomposition> {
        self.decomposer.validate(job_id, complexity_hint)?;
        let key = format!("{job_id}|{}", complexity_hint.unwrap_or(0));
        let decomposer = Arc::clone(&self.decomposer);
        let id = job_id.to_string();
        self.cache
            .with_cache(DECOMPOSITION_NAMESPACE, &key, move || async move {
                decomposer.decompose(&id, complexity_hint)
            })
            .await
    }

    pub fn scheduler(&self, options: RunOptions) -> BatchScheduler<'_> {
        BatchScheduler::new(self, options)
    }
}

pub struct OrchestrationContextBuilder {
    config: OrchestratorConfig,
    command_executor: Option<Arc<dyn CommandExecutor>>,
    reviewer_policy: Option<Arc<dyn ReviewerPolicy>>,
    register_configured_workers: bool,
}

impl OrchestrationContextBuilder {
    pub fn with_command_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.command_executor = Some(executor);
        self
    }

    pub fn with_reviewer_policy(mut self, policy: Arc<dyn ReviewerPolicy>) -> Self {
        self.reviewer_policy = Some(policy);
        self
    }

    /// Leave the configured worker roster out of the registry
    pub fn without_configured_workers(mut self) -> Self {
        self.register_configured_workers = false;
        self
    }

    pub fn build(self) -> Result<OrchestrationContext> {
        let config = self.config;
        let executor = self
            .command_executor
            .unwrap_or_else(|| Arc::new(ProcessCommandExecutor));
        let policy = self
            .reviewer_policy
            .unwrap_or_else(|| policy_from_config(&config.hooks.consensus));

        let capabilities = CapabilityTable::new(&config.capabilities, &config.task_roles);
        let decomposer = TaskDecomposer::new(capabilities.clone(), config.decomposer.clone())?;
        let registry = AgentRegistry::new(capabilities);

        if self.register_configured_workers {
            for spec in &config.workers {
                let worker = CapabilityWorker::from_spec(spec, Arc::clone(&executor));
                registry.register(Arc::new(worker))?;
            }
        }

        let hooks = HookRunner::with_parts(&config.hooks, executor, policy);
        let cache = TtlCache::new(config.cache.clone());

        info!(
            workers = registry.len(),
            hooks_bound = hooks.bindings().len(),
            environment = %config.hooks.environment,
            "Orchestration context ready"
        );

        Ok(OrchestrationContext {
            config: Arc::new(config),
            registry: Arc::new(registry),
            decomposer: Arc::new(decomposer),
            cache: Arc::new(cache),
            hooks: Arc::new(hooks),
            metrics: Arc::new(RunMetrics::new()),
        })
    }
}
