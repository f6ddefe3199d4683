//! Batch scheduling and bounded-concurrency execution
//!
//! Jobs are validated as a whole, decomposed, grouped into batches by
//! strategy and run batch after batch. A job's failure is recorded in the
//! report and never stops the run unless `fail_fast` is set.

pub mod batch;
pub mod job;
pub mod lifecycle;
pub mod operation;
pub mod report;

pub use batch::{plan_batches, smart_batch_size, Batch, PlanItem, Strategy};
pub use job::{load_jobs, parse_jobs, Job, JobStatus};
pub use lifecycle::{JobEvent, JobTracker, TransitionError};
pub use operation::{DelegatingOperation, FnOperation, JobOperation, OperationKind, OperationRequest};
pub use report::{JobResult, SchedulerReport};

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::context::OrchestrationContext;
use crate::decomposer::{Decomposition, DependencyGraph};
use crate::error::{OrchestratorError, Result};
use crate::hooks::HookType;
use crate::observability::OperationTimer;
use crate::telemetry::{create_scheduling_span, generate_correlation_id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub strategy: Strategy,
    /// Overrides `scheduler.max_concurrent_jobs`
    pub max_concurrent: Option<usize>,
    pub operation: OperationKind,
}

impl RunOptions {
    pub fn new(strategy: Strategy, operation: OperationKind) -> Self {
        Self {
            strategy,
            max_concurrent: None,
            operation,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }
}

/// One job as it goes into a batch
struct JobSlot<'a> {
    job: &'a Job,
    plan: &'a Decomposition,
    complexity: u8,
    batch_index: usize,
}

pub struct BatchScheduler<'ctx> {
    context: &'ctx OrchestrationContext,
    options: RunOptions,
}

impl<'ctx> BatchScheduler<'ctx> {
    pub fn new(context: &'ctx OrchestrationContext, options: RunOptions) -> Self {
        Self { context, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    fn max_concurrent(&self) -> usize {
        self.options
            .max_concurrent
            .unwrap_or(self.context.config().scheduler.max_concurrent_jobs)
    }

    /// Run every job to a terminal status
    ///
    /// Only validation problems with the submission as a whole are returned
    /// as errors; those are raised before any worker is assigned.
    pub async fn run(&self, jobs: &[Job], operation: &dyn JobOperation) -> Result<SchedulerReport> {
        let timer = OperationTimer::new("scheduler_run");
        let max_concurrent = self.max_concurrent();
        if max_concurrent == 0 {
            return Err(OrchestratorError::validation("max_concurrent must be at least 1"));
        }
        let (order, levels) = self.validate(jobs)?;

        let mut plans = Vec::with_capacity(jobs.len());
        for job in jobs {
            plans.push(self.context.decompose(&job.id, job.complexity).await?);
        }

        let config = &self.context.config().scheduler;
        let worker_budget = config
            .worker_budget
            .unwrap_or_else(|| self.context.registry().len());
        let items: Vec<PlanItem> = order
            .iter()
            .map(|&index| PlanItem {
                index,
                complexity: plans[index].job_complexity(),
                level: levels[index],
            })
            .collect();
        let batches = plan_batches(
            self.options.strategy,
            &items,
            worker_budget,
            config.max_smart_batch_size,
        );

        let correlation_id = generate_correlation_id();
        let span = create_scheduling_span("run", None, Some(&correlation_id));
        let results = self
            .run_batches(jobs, &plans, &batches, max_concurrent, operation, &correlation_id)
            .instrument(span)
            .await;

        let report = SchedulerReport::new(
            correlation_id,
            self.options.strategy,
            self.options.operation,
            batches.len(),
            results,
            self.context.registry().workload_report(),
            timer.finish().as_millis() as u64,
        );
        self.finish(&report).await;
        Ok(report)
    }

    /// Reject the whole submission on the first structural problem
    ///
    /// Returns submission indexes in dependency order and each job's level.
    fn validate(&self, jobs: &[Job]) -> Result<(Vec<usize>, Vec<usize>)> {
        let decomposer = self.context.decomposer();
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(jobs.len());
        let mut graph = DependencyGraph::new();

        for (position, job) in jobs.iter().enumerate() {
            decomposer.validate(&job.id, job.complexity)?;
            if index.insert(job.id.as_str(), position).is_some() {
                return Err(OrchestratorError::validation(format!(
                    "job '{}' is submitted more than once",
                    job.id
                )));
            }
            graph.add_node(&job.id)?;
        }

        for job in jobs {
            for dep in &job.depends_on {
                if !index.contains_key(dep.as_str()) {
                    return Err(OrchestratorError::validation(format!(
                        "job '{}' depends on unknown job '{dep}'",
                        job.id
                    )));
                }
                graph.add_edge(&job.id, dep)?;
            }
        }

        let order: Vec<usize> = graph
            .topological_order()?
            .iter()
            .filter_map(|id| index.get(id.as_str()).copied())
            .collect();
        let by_id = graph.levels()?;
        let levels: Vec<usize> = jobs
            .iter()
            .map(|job| by_id.get(&job.id).copied().unwrap_or(0))
            .collect();
        Ok((order, levels))
    }

    async fn run_batches(
        &self,
        jobs: &[Job],
        plans: &[Decomposition],
        batches: &[Batch],
        max_concurrent: usize,
        operation: &dyn JobOperation,
        correlation_id: &str,
    ) -> Vec<JobResult> {
        let fail_fast = self.context.config().scheduler.fail_fast;
        let cooldown = self.context.config().scheduler.batch_cooldown();
        let mut statuses: HashMap<&str, JobStatus> = HashMap::with_capacity(jobs.len());
        let mut results: Vec<Option<JobResult>> = vec![None; jobs.len()];
        let mut failed = false;

        info!(
            strategy = %self.options.strategy,
            operation = %self.options.operation,
            jobs = jobs.len(),
            batches = batches.len(),
            max_concurrent,
            "Scheduler run started"
        );

        for (n, batch) in batches.iter().enumerate() {
            let mut runnable = Vec::with_capacity(batch.jobs.len());
            for &index in &batch.jobs {
                let job = &jobs[index];
                let reason = if fail_fast && failed {
                    Some("skipped after an earlier failure".to_string())
                } else {
                    job.depends_on
                        .iter()
                        .find(|dep| statuses.get(dep.as_str()) != Some(&JobStatus::Succeeded))
                        .map(|dep| format!("dependency {dep} did not succeed"))
                };

                match reason {
                    Some(reason) => {
                        let result = skipped(job, &plans[index], batch.index, reason);
                        statuses.insert(job.id.as_str(), result.status);
                        results[index] = Some(result);
                    }
                    None => runnable.push(index),
                }
            }

            debug!(batch = batch.index, jobs = runnable.len(), "Running batch");
            let width = runnable.len().min(max_concurrent).max(1);
            let finished: Vec<(usize, JobResult)> = stream::iter(runnable)
                .map(|index| {
                    let slot = JobSlot {
                        job: &jobs[index],
                        plan: &plans[index],
                        complexity: plans[index].job_complexity(),
                        batch_index: batch.index,
                    };
                    async move { (index, self.run_job(slot, operation, correlation_id).await) }
                })
                .buffer_unordered(width)
                .collect()
                .await;

            for (index, result) in finished {
                failed |= result.status == JobStatus::Failed;
                statuses.insert(jobs[index].id.as_str(), result.status);
                results[index] = Some(result);
            }

            if n + 1 < batches.len() && !cooldown.is_zero() {
                tokio::time::sleep(cooldown).await;
            }
        }

        results.into_iter().flatten().collect()
    }

    async fn run_job(&self, slot: JobSlot<'_>, operation: &dyn JobOperation, correlation_id: &str) -> JobResult {
        let span = create_scheduling_span(
            self.options.operation.to_string().as_str(),
            Some(&slot.job.id),
            Some(correlation_id),
        );

        async move {
            let started = Instant::now();
            let mut tracker = JobTracker::new(&slot.job.id);
            let outcome = self.drive(&mut tracker, &slot, operation).await;

            let (summary, error, error_kind) = match outcome {
                Ok(summary) => {
                    if let Err(e) = tracker.apply(JobEvent::Succeed) {
                        warn!(error = %e, "Unexpected lifecycle transition");
                    }
                    (Some(summary), None, None)
                }
                Err(err) => {
                    let reason = err.to_string();
                    if let Err(e) = tracker.apply(JobEvent::Fail {
                        reason: reason.clone(),
                    }) {
                        warn!(error = %e, "Unexpected lifecycle transition");
                    }
                    (None, Some(reason), Some(err.kind().to_string()))
                }
            };

            let result = JobResult {
                job_id: slot.job.id.clone(),
                status: tracker.status(),
                error,
                error_kind,
                summary,
                workers: tracker.workers().to_vec(),
                complexity: slot.complexity,
                duration_ms: started.elapsed().as_millis() as u64,
                batch_index: slot.batch_index,
            };
            self.report_outcome(&result).await;
            result
        }
        .instrument(span)
        .await
    }

    /// Assignment through operation; the lease releases workers on every path out
    async fn drive(&self, tracker: &mut JobTracker, slot: &JobSlot<'_>, operation: &dyn JobOperation) -> Result<String> {
        let job = slot.job;
        let registry = self.context.registry();
        let hooks = self.context.hooks();
        let config = &self.context.config().scheduler;

        let wanted = config
            .max_workers_per_job
            .min(slot.complexity as usize * 2)
            .max(1);

        let mut pending = self.hook_data(slot, &[]);
        pending["requested_agents"] = json!(wanted);
        hooks.run_hook(HookType::PreAgentAssign, &pending).await;

        let (selected, lease) = registry.lease_least_loaded(&job.id, wanted, &job.requires)?;
        let worker_ids: Vec<String> = selected.iter().map(|w| w.id().to_string()).collect();
        let mut data = self.hook_data(slot, &worker_ids);

        tracker
            .apply(JobEvent::Assign {
                workers: worker_ids.clone(),
            })
            .map_err(|e| OrchestratorError::execution(&job.id, e.to_string()))?;
        hooks.run_hook(HookType::PostAgentAssign, &data).await;

        let op_hooks = self.options.operation.hooks();
        if let Some((pre, _)) = op_hooks {
            if config.blocking_pre_hooks {
                hooks.run_gated(pre, &data).await?;
            } else {
                hooks.run_hook(pre, &data).await;
            }
        }

        tracker
            .apply(JobEvent::Start)
            .map_err(|e| OrchestratorError::execution(&job.id, e.to_string()))?;

        let mut plan = slot.plan.clone();
        let bindings: Vec<_> = selected.iter().map(|w| w.binding()).collect();
        plan.bind_workers(&bindings);
        let request = OperationRequest {
            kind: self.options.operation,
            job,
            plan: &plan,
            workers: &selected,
        };

        let outcome = match config.job_timeout() {
            Some(limit) => tokio::time::timeout(limit, run_operation(operation, &request))
                .await
                .unwrap_or_else(|_| {
                    Err(OrchestratorError::Timeout {
                        job_id: job.id.clone(),
                        seconds: limit.as_secs(),
                    })
                }),
            None => run_operation(operation, &request).await,
        };

        if let Some((_, post)) = op_hooks {
            data["status"] = json!(if outcome.is_ok() { "succeeded" } else { "failed" });
            hooks.run_hook(post, &data).await;
        }

        let released = lease.release();
        debug!(job_id = %job.id, workers = ?released, "Workers released");
        outcome
    }

    fn hook_data(&self, slot: &JobSlot<'_>, workers: &[String]) -> Value {
        json!({
            "feature_id": slot.job.id,
            "type": slot.job.kind,
            "title": slot.job.title,
            "complexity": slot.complexity,
            "agents": workers,
            "operation": self.options.operation.to_string(),
            "batch": slot.batch_index,
        })
    }

    async fn report_outcome(&self, result: &JobResult) {
        let hooks = self.context.hooks();
        match result.status {
            JobStatus::Succeeded => {
                let data = json!({
                    "feature_id": result.job_id,
                    "agents": result.workers,
                    "operation": self.options.operation.to_string(),
                });
                hooks.run_hook(HookType::OnSuccess, &data).await;
            }
            JobStatus::Failed => {
                let data = json!({
                    "feature_id": result.job_id,
                    "original_hook": self.options.operation.to_string(),
                    "error": result.error.clone().unwrap_or_default(),
                });
                hooks.run_hook(HookType::OnError, &data).await;
            }
            _ => {}
        }
    }

    async fn finish(&self, report: &SchedulerReport) {
        let hooks = self.context.hooks();
        let metrics = self.context.metrics();
        metrics.record_run(report.batches);
        metrics.record_outcomes(report.succeeded, report.failed, report.skipped);

        if report.failed > 0 {
            let failures: Vec<&str> = report.failures().map(|r| r.job_id.as_str()).collect();
            warn!(failed = report.failed, jobs = ?failures, "Scheduler run finished with failures");
            let data = json!({
                "correlation_id": report.correlation_id,
                "failed": report.failed,
                "jobs": failures,
            });
            hooks.run_hook(HookType::OnWarning, &data).await;
        }

        let data = json!({
            "correlation_id": report.correlation_id,
            "strategy": report.strategy.to_string(),
            "operation": report.operation.to_string(),
            "total": report.total,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "skipped": report.skipped,
        });
        hooks.run_hook(HookType::OnComplete, &data).await;

        info!(
            correlation_id = %report.correlation_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Scheduler run finished"
        );
    }
}

/// A panicking operation fails its job instead of tearing down the run
async fn run_operation(operation: &dyn JobOperation, request: &OperationRequest<'_>) -> Result<String> {
    match AssertUnwindSafe(operation.run(request)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(job_id = %request.job.id, panic = %message, "Operation panicked");
            Err(OrchestratorError::execution(
                &request.job.id,
                format!("operation panicked: {message}"),
            ))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn skipped(job: &Job, plan: &Decomposition, batch_index: usize, reason: String) -> JobResult {
    let mut tracker = JobTracker::new(&job.id);
    if let Err(e) = tracker.apply(JobEvent::Skip {
        reason: reason.clone(),
    }) {
        warn!(error = %e, "Unexpected lifecycle transition");
    }
    JobResult {
        job_id: job.id.clone(),
        status: tracker.status(),
        error: Some(reason),
        error_kind: None,
        summary: None,
        workers: Vec::new(),
        complexity: plan.job_complexity(),
        duration_ms: 0,
        batch_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::CapabilityWorker;
    use crate::config::OrchestratorConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context(workers: usize) -> OrchestrationContext {
        let mut config = OrchestratorConfig::default();
        config.scheduler.batch_cooldown_ms = 0;
        config.hooks.enabled = false;
        let ctx = OrchestrationContext::builder(config)
            .without_configured_workers()
            .build()
            .unwrap();
        for n in 1..=workers {
            let worker = CapabilityWorker::new(format!("agent{n:03}"), ["developer", "qa-engineer"]);
            ctx.register_worker(Arc::new(worker)).unwrap();
        }
        ctx
    }

    fn counting(calls: Arc<AtomicUsize>) -> impl JobOperation {
        FnOperation::new(move |_job: Job, _kind: OperationKind| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("done".to_string())
            }
        })
    }

    #[tokio::test]
    async fn test_rejects_bad_submissions_before_touching_workers() {
        let ctx = context(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let op = counting(Arc::clone(&calls));
        let scheduler = ctx.scheduler(RunOptions::default());

        let cases = vec![
            vec![Job::new("backend.1"), Job::new("backend.1")],
            vec![Job::new("backend.1").depending_on("backend.9")],
            vec![
                Job::new("backend.1").depending_on("backend.2"),
                Job::new("backend.2").depending_on("backend.1"),
            ],
            vec![Job::new("backend.1").depending_on("backend.1")],
            vec![Job::new("backend.1").with_complexity(9)],
            vec![Job::new("1.backend")],
        ];
        for jobs in cases {
            let err = scheduler.run(&jobs, &op).await.unwrap_err();
            assert!(err.is_fatal(), "{err}");
        }

        let zero = ctx.scheduler(RunOptions::default().with_max_concurrent(0));
        assert!(zero.run(&[Job::new("ai.1")], &op).await.is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.registry().workload_report().total_load, 0);
        assert_eq!(ctx.metrics().get_stats().runs, 0);
    }

    #[tokio::test]
    async fn test_every_job_reported_in_submission_order() {
        let ctx = context(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let op = counting(Arc::clone(&calls));
        let jobs = vec![
            Job::new("security.1").with_complexity(5),
            Job::new("frontend.1").with_complexity(1),
            Job::new("backend.1").with_complexity(1),
        ];

        let report = ctx
            .scheduler(RunOptions::new(Strategy::Smart, OperationKind::Start))
            .run(&jobs, &op)
            .await
            .unwrap();

        let ids: Vec<&str> = report.results.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["security.1", "frontend.1", "backend.1"]);
        assert!(report.all_succeeded());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.workload.total_load, 0);
        assert_eq!(report.results[0].summary.as_deref(), Some("done"));
        assert_eq!(ctx.metrics().get_stats().jobs_succeeded, 3);
    }

    #[tokio::test]
    async fn test_unsatisfiable_capability_fails_only_that_job() {
        let ctx = context(2);
        let op = counting(Arc::new(AtomicUsize::new(0)));
        let jobs = vec![
            Job::new("backend.1").requiring("penetration-tester"),
            Job::new("backend.2"),
        ];

        let report = ctx
            .scheduler(RunOptions::new(Strategy::Parallel, OperationKind::Start))
            .run(&jobs, &op)
            .await
            .unwrap();

        let failed = report.result("backend.1").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_kind.as_deref(), Some("not_found"));
        assert!(failed.workers.is_empty());
        assert!(report.result("backend.2").unwrap().succeeded());
        assert_eq!(report.workload.total_load, 0);
    }

    #[tokio::test]
    async fn test_empty_submission_is_an_empty_report() {
        let ctx = context(1);
        let op = counting(Arc::new(AtomicUsize::new(0)));
        let report = ctx
            .scheduler(RunOptions::default())
            .run(&[], &op)
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.batches, 0);
    }
}
