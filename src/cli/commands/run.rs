use anyhow::{bail, Result};

use crate::cli::commands::with_context;
use crate::scheduler::{load_jobs, DelegatingOperation, JobStatus, OperationKind, RunOptions, SchedulerReport, Strategy};

pub struct RunCommand {
    pub jobs: String,
    pub strategy: String,
    pub max_concurrent: Option<usize>,
    pub operation: String,
    pub json: bool,
    pub config: Option<String>,
}

impl RunCommand {
    pub async fn execute(&self) -> Result<()> {
        let strategy: Strategy = self.strategy.parse()?;
        let operation: OperationKind = self.operation.parse()?;
        let jobs = load_jobs(&self.jobs)?;
        let context = with_context(self.config.as_deref())?;

        if context.registry().is_empty() {
            bail!("no workers configured; add [[workers]] entries to the configuration");
        }

        let mut options = RunOptions::new(strategy, operation);
        if let Some(max) = self.max_concurrent {
            options = options.with_max_concurrent(max);
        }

        if !self.json {
            println!(
                "🚀 Scheduling {} job(s) over {} worker(s) ({strategy}, {operation})...",
                jobs.len(),
                context.registry().len()
            );
            println!();
        }

        let report = context.scheduler(options).run(&jobs, &DelegatingOperation).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
            context.cache().log_stats();
            context.metrics().log_stats();
        }

        if report.failed > 0 {
            bail!("{} of {} job(s) failed", report.failed, report.total);
        }
        Ok(())
    }
}

fn print_report(report: &SchedulerReport) {
    for result in &report.results {
        let marker = match result.status {
            JobStatus::Succeeded => "✅",
            JobStatus::Failed => "❌",
            JobStatus::Skipped => "⏭️ ",
            _ => "❔",
        };
        println!(
            "{marker} {} [batch {}, complexity {}] {}",
            result.job_id, result.batch_index, result.complexity, result.status
        );
        if !result.workers.is_empty() {
            println!("   👥 Workers: {}", result.workers.join(", "));
        }
        if let Some(summary) = &result.summary {
            println!("   📋 {summary}");
        }
        if let Some(error) = &result.error {
            println!("   ⚠️  {error}");
        }
    }

    println!();
    println!("📊 RUN SUMMARY ({})", report.correlation_id);
    println!("   Total: {}  Succeeded: {}  Failed: {}  Skipped: {}", report.total, report.succeeded, report.failed, report.skipped);
    println!("   Batches: {}  Duration: {}ms", report.batches, report.duration_ms);
    println!(
        "   Workload after run: {} active job(s), total load {}",
        report.workload.active_jobs, report.workload.total_load
    );
}
