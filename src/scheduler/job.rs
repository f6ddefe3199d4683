use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Assigned,
    Running,
    Succeeded,
    Failed,
    /// Never attempted because a dependency did not succeed
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Skipped)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Skipped => write!(f, "skipped"),
        }
    }
}

fn default_kind() -> String {
    "feature".to_string()
}

/// A job as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Hierarchical id; the leading segment selects the domain
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "complexity_hint")]
    pub complexity: Option<u8>,
    /// Capability tags every assigned worker must satisfy
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: default_kind(),
            title: String::new(),
            complexity: None,
            requires: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn requiring(mut self, tag: impl Into<String>) -> Self {
        self.requires.push(tag.into());
        self
    }

    pub fn depending_on(mut self, job_id: impl Into<String>) -> Self {
        self.depends_on.push(job_id.into());
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobFile {
    Wrapped { jobs: Vec<Job> },
    Bare(Vec<Job>),
}

impl From<JobFile> for Vec<Job> {
    fn from(file: JobFile) -> Self {
        match file {
            JobFile::Wrapped { jobs } | JobFile::Bare(jobs) => jobs,
        }
    }
}

/// Read a job list: `.json` holds an array or `{ "jobs": [...] }`, anything else is TOML `[[jobs]]`
pub fn load_jobs<P: AsRef<Path>>(path: P) -> Result<Vec<Job>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_jobs(&content, path.extension().and_then(|e| e.to_str()) == Some("json"))
}

pub fn parse_jobs(content: &str, json: bool) -> Result<Vec<Job>> {
    let file: JobFile = if json {
        serde_json::from_str(content)?
    } else {
        toml::from_str(content)?
    };
    let jobs: Vec<Job> = file.into();
    if jobs.is_empty() {
        return Err(OrchestratorError::validation("job list is empty"));
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_job_file() {
        let jobs = parse_jobs(
            r#"
[[jobs]]
id = "frontend.1"
type = "feature"
title = "Login form"
complexity_hint = 2

[[jobs]]
id = "backend.2"
requires = ["backend"]
depends_on = ["frontend.1"]
"#,
            false,
        )
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].complexity, Some(2));
        assert_eq!(jobs[1].kind, "feature");
        assert_eq!(jobs[1].depends_on, vec!["frontend.1"]);
    }

    #[test]
    fn test_json_job_file_shapes() {
        let bare = parse_jobs(r#"[{"id": "ai.1", "complexity": 4}]"#, true).unwrap();
        assert_eq!(bare[0].complexity, Some(4));

        let wrapped = parse_jobs(r#"{"jobs": [{"id": "security.3", "type": "audit"}]}"#, true).unwrap();
        assert_eq!(wrapped[0].kind, "audit");

        assert_eq!(parse_jobs("[]", true).unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
        assert_eq!(JobStatus::Succeeded.to_string(), "succeeded");
    }
}
