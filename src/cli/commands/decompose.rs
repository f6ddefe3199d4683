use anyhow::Result;

use crate::cli::commands::with_context;
use crate::decomposer::Decomposition;

pub struct DecomposeCommand {
    pub job_id: String,
    pub complexity: Option<u8>,
    pub json: bool,
    pub config: Option<String>,
}

impl DecomposeCommand {
    pub async fn execute(&self) -> Result<()> {
        let context = with_context(self.config.as_deref())?;
        let decomposition = context.decompose(&self.job_id, self.complexity).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&decomposition)?);
        } else {
            print_tree(&decomposition);
        }
        Ok(())
    }
}

fn print_tree(d: &Decomposition) {
    println!("🧩 {} ({} domain)", d.job_id, d.domain);
    println!();
    for task in &d.tasks {
        println!(
            "  📋 {} {} [{}, complexity {}, {}h]",
            task.id, task.title, task.task_type, task.complexity, task.estimated_hours
        );
        println!("     👤 Roles: {}", task.roles.join(", "));
        if !task.depends_on.is_empty() {
            println!("     🔗 After: {}", task.depends_on.join(", "));
        }
        for subtask in &task.subtasks {
            println!("     • {} ({}h)", subtask.title, subtask.hours);
        }
    }
    println!();
    println!("📊 ESTIMATE:");
    println!(
        "   Complexity: {} total, {:.1} average (job complexity {})",
        d.total_complexity,
        d.average_complexity,
        d.job_complexity()
    );
    println!(
        "   Effort: {}h ≈ {} day(s) ≈ {} iteration(s)",
        d.total_hours, d.estimated_days, d.estimated_iterations
    );
}
