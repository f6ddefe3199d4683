use crate::config::OrchestratorConfig;
use crate::context::OrchestrationContext;
use anyhow::{Context, Result};

pub mod decompose;
pub mod hook;
pub mod hooks;
pub mod run;

/// Load configuration and build the orchestration context for a command
pub fn with_context(config_path: Option<&str>) -> Result<OrchestrationContext> {
    let config = match config_path {
        Some(path) => OrchestratorConfig::load_from(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => OrchestratorConfig::load().context("failed to load configuration")?,
    };
    let context = OrchestrationContext::new(config).context("failed to build orchestration context")?;
    Ok(context)
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🎯 Feature Orchestrator - Capability-aware feature delivery");
    println!();
    println!("To get started:");
    println!("  🧩 feature-orchestrator decompose backend.2    # Break a job into tasks");
    println!("  🚀 feature-orchestrator run --jobs jobs.toml   # Schedule a job file");
    println!();
    println!("Hooks:");
    println!("  🪝 feature-orchestrator hooks                  # List lifecycle points");
    println!("  ▶️  feature-orchestrator hook pre-commit        # Run one hook");
    println!();
    println!("💡 Workers come from [[workers]] in orchestrator.toml");
    Ok(())
}
