use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::cli::commands::with_context;
use crate::hooks::{HookOutcome, HookType};

pub struct HookCommand {
    pub hook_type: String,
    pub data: Option<String>,
    pub config: Option<String>,
}

impl HookCommand {
    pub async fn execute(&self) -> Result<()> {
        let hook_type: HookType = self.hook_type.parse()?;
        let data: Value = match &self.data {
            Some(raw) => serde_json::from_str(raw).context("--data must be a JSON object")?,
            None => Value::Object(Default::default()),
        };
        let context = with_context(self.config.as_deref())?;

        print!("🪝 Running {hook_type}... ");
        std::io::Write::flush(&mut std::io::stdout())?;
        let invocation = context.hooks().run_hook(hook_type, &data).await;

        match invocation.outcome {
            HookOutcome::NotConfigured => {
                println!("⏭️");
                println!("   No command is bound to {hook_type}");
                return Ok(());
            }
            HookOutcome::Succeeded => println!("✅ ({}ms)", invocation.duration_ms),
            HookOutcome::Failed => println!("❌ ({}ms)", invocation.duration_ms),
        }

        if !invocation.stdout.trim().is_empty() {
            println!("{}", invocation.stdout.trim_end());
        }
        if let Some(consensus) = &invocation.consensus {
            let marker = if consensus.validated { "✅" } else { "❌" };
            println!(
                "{marker} Consensus: {}/{} approvals (threshold {:.0}%)",
                consensus.approvals,
                consensus.total,
                consensus.threshold * 100.0
            );
            for verdict in &consensus.verdicts {
                println!("   👤 {}: {:?}", verdict.reviewer, verdict.verdict);
            }
        }

        if let Some(error) = &invocation.error {
            bail!("{hook_type} failed: {error}");
        }
        Ok(())
    }
}
