use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "feature-orchestrator")]
#[command(about = "Capability-aware feature delivery orchestration")]
#[command(long_about = "Feature Orchestrator decomposes feature jobs into weighted task trees, \
                       balances them over capability-tagged workers in batches, and runs lifecycle \
                       hooks with reviewer consensus around every step. Start with \
                       'feature-orchestrator decompose <job-id>' to see how a job breaks down.")]
pub struct Cli {
    /// Configuration file (defaults to orchestrator.toml)
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule a job file over the registered workers
    Run {
        /// Job file: TOML with [[jobs]] or JSON
        #[arg(long, help = "Path to the job file (.toml or .json)")]
        jobs: String,
        /// Batching strategy
        #[arg(long, default_value = "smart", help = "Batching strategy: sequential, parallel, smart")]
        strategy: String,
        /// Maximum concurrently running jobs
        #[arg(long, help = "Override scheduler.max_concurrent_jobs")]
        max_concurrent: Option<usize>,
        /// Operation to run for every job
        #[arg(long, default_value = "start", help = "Operation: start, scaffold, decompose, review")]
        operation: String,
        /// Print the run report as JSON
        #[arg(long, help = "Emit the report as JSON instead of a summary")]
        json: bool,
    },
    /// Show the task tree for one job id
    Decompose {
        /// Job id such as backend.2.1
        job_id: String,
        /// Complexity hint (1-5)
        #[arg(long, help = "Complexity hint between 1 and 5")]
        complexity: Option<u8>,
        /// Print the decomposition as JSON
        #[arg(long, help = "Emit the decomposition as JSON")]
        json: bool,
    },
    /// Run the command bound to one lifecycle point
    Hook {
        /// Lifecycle point such as pre-commit
        hook_type: String,
        /// JSON object passed to the hook
        #[arg(long, help = "JSON object exposed to the hook as HOOK_DATA_* variables")]
        data: Option<String>,
    },
    /// List lifecycle points and their bound commands
    Hooks,
}
