use anyhow::Result;

use crate::cli::commands::with_context;
use crate::hooks::HookType;

pub struct HooksCommand {
    pub config: Option<String>,
}

impl HooksCommand {
    pub async fn execute(&self) -> Result<()> {
        let context = with_context(self.config.as_deref())?;
        let hooks = context.hooks();
        let bound = hooks.bindings();

        println!("🪝 Lifecycle points ({} bound)", bound.len());
        println!();
        for hook_type in HookType::ALL {
            let command = bound
                .iter()
                .find(|(t, _)| *t == hook_type)
                .map(|(_, command)| command.as_str());
            let gate = if hooks.is_gated(hook_type) { " 🔒" } else { "" };
            match command {
                Some(command) => println!("  ✅ {hook_type:<18}{gate} {command}"),
                None => println!("  ⬜ {hook_type:<18}{gate}"),
            }
        }
        println!();
        println!("🔒 = reviewer consensus required");
        Ok(())
    }
}
