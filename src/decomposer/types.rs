use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{OrchestratorError, Result};

static JOB_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_-]*)((?:[./][0-9]+)*)$").unwrap());

/// Hierarchical job id: a domain tag followed by numeric segments (`backend.2.1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    raw: String,
    domain: String,
    segments: Vec<u32>,
}

impl JobId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let captures = JOB_ID_PATTERN
            .captures(trimmed)
            .ok_or_else(|| OrchestratorError::validation(format!("malformed job id '{raw}'")))?;

        let domain = captures[1].to_ascii_lowercase();
        let segments = captures
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split(['.', '/'])
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>().map_err(|_| {
                    OrchestratorError::validation(format!("job id segment '{s}' out of range"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            domain,
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for JobId {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        JobId::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Design,
    Implementation,
    Testing,
    Review,
    Research,
    Analysis,
    Integration,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Design => "design",
            TaskType::Implementation => "implementation",
            TaskType::Testing => "testing",
            TaskType::Review => "review",
            TaskType::Research => "research",
            TaskType::Analysis => "analysis",
            TaskType::Integration => "integration",
        }
    }

    /// Work that shapes what gets built
    pub fn is_planning(self) -> bool {
        matches!(self, TaskType::Design | TaskType::Research | TaskType::Analysis)
    }

    /// Work that produces the change itself
    pub fn is_build(self) -> bool {
        matches!(self, TaskType::Implementation | TaskType::Integration)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// 1 (trivial) to 5 (hardest)
    pub complexity: u8,
    pub estimated_hours: f64,
    pub subtasks: Vec<Subtask>,
    /// Capability roles able to take the task, most specific first
    pub roles: Vec<String>,
    #[serde(default)]
    pub assigned_workers: Vec<String>,
    #[serde(default)]
    pub lead_worker: Option<String>,
    pub depends_on: Vec<String>,
}

/// Worker identity as seen by the decomposer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerBinding {
    pub id: String,
    pub capabilities: Vec<String>,
}

/// Weighted task tree for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub job_id: String,
    pub domain: String,
    pub complexity_hint: Option<u8>,
    pub tasks: Vec<Task>,
    pub total_complexity: u32,
    pub average_complexity: f64,
    pub total_hours: f64,
    pub estimated_days: u32,
    pub estimated_iterations: u32,
}

impl Decomposition {
    /// The hint when given, otherwise the rounded-up average task complexity
    pub fn job_complexity(&self) -> u8 {
        match self.complexity_hint {
            Some(hint) => hint.clamp(1, 5),
            None => (self.average_complexity.ceil() as u8).clamp(1, 5),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn testing_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|task| task.task_type == TaskType::Testing)
    }

    /// Spread selected workers over tasks by role overlap
    ///
    /// Tasks no worker has a role for get every selected worker. The first
    /// worker bound to a task leads it.
    pub fn bind_workers(&mut self, workers: &[WorkerBinding]) {
        for task in &mut self.tasks {
            let roles: HashSet<&str> = task.roles.iter().map(String::as_str).collect();
            let mut matching: Vec<String> = workers
                .iter()
                .filter(|w| w.capabilities.iter().any(|c| roles.contains(c.as_str())))
                .map(|w| w.id.clone())
                .collect();
            if matching.is_empty() {
                matching = workers.iter().map(|w| w.id.clone()).collect();
            }
            task.lead_worker = matching.first().cloned();
            task.assigned_workers = matching;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_ids() {
        let id = JobId::parse("Backend.2.1").unwrap();
        assert_eq!(id.domain(), "backend");
        assert_eq!(id.segments(), &[2, 1]);
        assert_eq!(id.as_str(), "Backend.2.1");

        let id: JobId = "ai/7".parse().unwrap();
        assert_eq!(id.domain(), "ai");
        assert_eq!(id.depth(), 1);

        assert_eq!(JobId::parse("security").unwrap().depth(), 0);
    }

    #[test]
    fn test_malformed_job_ids() {
        for bad in ["", "1.2", "frontend.", "frontend..2", "front end", "ai.x", "ai.99999999999"] {
            let err = JobId::parse(bad).unwrap_err();
            assert_eq!(err.kind(), "validation", "{bad}");
        }
    }

    #[test]
    fn test_non_ascii_digits_are_malformed() {
        for bad in ["ai.\u{0661}", "backend.2.\u{0663}", "security/\u{FF15}"] {
            let err = JobId::parse(bad).unwrap_err();
            assert!(err.to_string().contains("malformed job id"), "{bad}: {err}");
        }
    }

    #[test]
    fn test_job_complexity_prefers_hint() {
        let mut decomposition = Decomposition {
            job_id: "ai.1".into(),
            domain: "ai".into(),
            complexity_hint: None,
            tasks: Vec::new(),
            total_complexity: 10,
            average_complexity: 2.5,
            total_hours: 0.0,
            estimated_days: 0,
            estimated_iterations: 0,
        };
        assert_eq!(decomposition.job_complexity(), 3);

        decomposition.complexity_hint = Some(5);
        assert_eq!(decomposition.job_complexity(), 5);
    }
}
