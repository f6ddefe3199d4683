use anyhow::Result;
use clap::Parser;

use feature_orchestrator::cli::commands::{
    decompose::DecomposeCommand, hook::HookCommand, hooks::HooksCommand, run::RunCommand,
    show_how_to_get_started,
};
use feature_orchestrator::cli::{Cli, Commands};
use feature_orchestrator::config::{ObservabilityConfig, OrchestratorConfig};
use feature_orchestrator::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = OrchestratorConfig::load_env_file() {
        eprintln!("Warning: failed to load .env file: {e}");
    }

    // Telemetry settings come from the same config the command will load
    let observability = OrchestratorConfig::load()
        .map(|config| config.observability)
        .unwrap_or_else(|_| ObservabilityConfig::default());
    if let Err(e) = init_telemetry(&observability) {
        eprintln!("Warning: failed to initialize telemetry: {e}");
    }

    let config = cli.config;
    tokio::runtime::Runtime::new()?.block_on(async move {
        match cli.command {
            None => show_how_to_get_started().await,
            Some(Commands::Run {
                jobs,
                strategy,
                max_concurrent,
                operation,
                json,
            }) => {
                RunCommand {
                    jobs,
                    strategy,
                    max_concurrent,
                    operation,
                    json,
                    config,
                }
                .execute()
                .await
            }
            Some(Commands::Decompose {
                job_id,
                complexity,
                json,
            }) => {
                DecomposeCommand {
                    job_id,
                    complexity,
                    json,
                    config,
                }
                .execute()
                .await
            }
            Some(Commands::Hook { hook_type, data }) => {
                HookCommand {
                    hook_type,
                    data,
                    config,
                }
                .execute()
                .await
            }
            Some(Commands::Hooks) => HooksCommand { config }.execute().await,
        }
    })
}
