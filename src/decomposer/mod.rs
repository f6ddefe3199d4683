//! Task decomposition
//!
//! Turns a job id into a weighted task tree. The domain tag picks a template,
//! deeper numeric segments raise complexity, and every tree ends in a
//! testing gate that depends on all the work before it.

pub mod graph;
pub mod rules;
pub mod types;

pub use graph::DependencyGraph;
pub use types::{Decomposition, JobId, Subtask, Task, TaskType, WorkerBinding};

use tracing::debug;

use crate::agents::CapabilityTable;
use crate::config::DecomposerConfig;
use crate::error::{OrchestratorError, Result};
use rules::{
    complexity_bonus, task_complexity, template_for, TaskTemplate, VALIDATION_SUBTASKS,
    VALIDATION_TASK_TITLE,
};

#[derive(Debug, Clone)]
pub struct TaskDecomposer {
    capabilities: CapabilityTable,
    config: DecomposerConfig,
}

impl TaskDecomposer {
    pub fn new(capabilities: CapabilityTable, config: DecomposerConfig) -> Result<Self> {
        if config.hours_per_day <= 0.0 || !config.hours_per_day.is_finite() {
            return Err(OrchestratorError::validation("hours_per_day must be positive"));
        }
        if config.days_per_iteration == 0 {
            return Err(OrchestratorError::validation("days_per_iteration must be positive"));
        }
        Ok(Self {
            capabilities,
            config,
        })
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Check an id and hint without building anything
    pub fn validate(&self, job_id: &str, complexity_hint: Option<u8>) -> Result<JobId> {
        if let Some(hint) = complexity_hint {
            if !(1..=5).contains(&hint) {
                return Err(OrchestratorError::validation(format!(
                    "complexity hint {hint} for '{job_id}' is outside 1..=5"
                )));
            }
        }
        JobId::parse(job_id)
    }

    /// Build the task tree for `job_id`; a pure function of its inputs
    pub fn decompose(&self, job_id: &str, complexity_hint: Option<u8>) -> Result<Decomposition> {
        let id = self.validate(job_id, complexity_hint)?;
        let bonus = complexity_bonus(id.segments(), &self.config.complexity_thresholds);
        let domain_role = self.capabilities.roles_for_domain(id.domain()).first();

        let mut tasks: Vec<Task> = template_for(id.domain())
            .iter()
            .enumerate()
            .map(|(n, template)| self.task_from_template(&id, n, template, bonus, complexity_hint, domain_role))
            .collect();

        if !tasks.iter().any(|task| task.task_type == TaskType::Testing) {
            let complexity = tasks.iter().map(|t| t.complexity).max().unwrap_or(1);
            let subtasks: Vec<Subtask> = VALIDATION_SUBTASKS
                .iter()
                .map(|s| Subtask {
                    title: s.title.to_string(),
                    hours: s.hours,
                })
                .collect();
            tasks.push(Task {
                id: format!("{id}#{}", tasks.len() + 1),
                title: VALIDATION_TASK_TITLE.to_string(),
                task_type: TaskType::Testing,
                complexity,
                estimated_hours: subtasks.iter().map(|s| s.hours).sum(),
                subtasks,
                roles: self.roles(TaskType::Testing, domain_role),
                assigned_workers: Vec::new(),
                lead_worker: None,
                depends_on: Vec::new(),
            });
        }

        link_dependencies(&mut tasks);

        let mut decomposition = Decomposition {
            job_id: id.to_string(),
            domain: id.domain().to_string(),
            complexity_hint,
            tasks,
            total_complexity: 0,
            average_complexity: 0.0,
            total_hours: 0.0,
            estimated_days: 0,
            estimated_iterations: 0,
        };
        decomposition.dependency_graph()?.topological_order()?;
        self.aggregate(&mut decomposition);

        debug!(
            job_id = %decomposition.job_id,
            tasks = decomposition.tasks.len(),
            total_complexity = decomposition.total_complexity,
            total_hours = decomposition.total_hours,
            "Decomposed job"
        );
        Ok(decomposition)
    }

    fn task_from_template(
        &self,
        id: &JobId,
        n: usize,
        template: &TaskTemplate,
        bonus: u8,
        hint: Option<u8>,
        domain_role: Option<&String>,
    ) -> Task {
        let subtasks: Vec<Subtask> = template
            .subtasks
            .iter()
            .map(|s| Subtask {
                title: s.title.to_string(),
                hours: s.hours,
            })
            .collect();

        Task {
            id: format!("{id}#{}", n + 1),
            title: template.title.to_string(),
            task_type: template.task_type,
            complexity: task_complexity(template.base_complexity, bonus, hint),
            estimated_hours: subtasks.iter().map(|s| s.hours).sum(),
            subtasks,
            roles: self.roles(template.task_type, domain_role),
            assigned_workers: Vec::new(),
            lead_worker: None,
            depends_on: Vec::new(),
        }
    }

    fn roles(&self, task_type: TaskType, domain_role: Option<&String>) -> Vec<String> {
        let mut roles = vec![self.capabilities.role_for_task(task_type).to_string()];
        if let Some(role) = domain_role {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
        roles
    }

    fn aggregate(&self, decomposition: &mut Decomposition) {
        let count = decomposition.tasks.len().max(1);
        let total_complexity: u32 = decomposition.tasks.iter().map(|t| t.complexity as u32).sum();
        let total_hours: f64 = decomposition.tasks.iter().map(|t| t.estimated_hours).sum();
        let estimated_days = (total_hours / self.config.hours_per_day).ceil() as u32;

        decomposition.total_complexity = total_complexity;
        decomposition.average_complexity = total_complexity as f64 / count as f64;
        decomposition.total_hours = total_hours;
        decomposition.estimated_days = estimated_days;
        decomposition.estimated_iterations = estimated_days.div_ceil(self.config.days_per_iteration);
    }
}

/// Planning feeds build work, build work feeds review, and testing waits on everything before it
fn link_dependencies(tasks: &mut [Task]) {
    for i in 0..tasks.len() {
        let task_type = tasks[i].task_type;
        let depends_on: Vec<String> = tasks[..i]
            .iter()
            .filter(|earlier| match task_type {
                TaskType::Testing => earlier.task_type != TaskType::Testing,
                TaskType::Review => earlier.task_type.is_build(),
                t if t.is_build() => earlier.task_type.is_planning(),
                _ => false,
            })
            .map(|earlier| earlier.id.clone())
            .collect();
        tasks[i].depends_on = depends_on;
    }
}

impl Decomposition {
    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for task in &self.tasks {
            graph.add_node(&task.id)?;
        }
        for task in &self.tasks {
            for dep in &task.depends_on {
                graph.add_edge(&task.id, dep)?;
            }
        }
        Ok(graph)
    }

    /// Tasks in an order that respects every dependency edge
    pub fn execution_order(&self) -> Result<Vec<&Task>> {
        let order = self.dependency_graph()?.topological_order()?;
        Ok(order.iter().filter_map(|id| self.task(id)).collect())
    }
}
