use thiserror::Error;

/// Errors surfaced by the orchestration core.
///
/// Job-level failures (`Execution`, `NotFound` during assignment, `Timeout`) are
/// recovered by the scheduler and recorded in the run report. `Validation` and
/// configuration errors abort a run before any worker is touched.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Job {job_id} failed: {message}")]
    Execution { job_id: String, message: String },
    #[error("Hook {hook} failed: {message}")]
    Hook { hook: String, message: String },
    #[error("Hook {hook} not validated: {approvals}/{total} approvals below threshold {threshold:.2}")]
    ConsensusRejected {
        hook: String,
        approvals: usize,
        total: usize,
        threshold: f64,
    },
    #[error("Cache producer for {namespace}/{key} failed: {message}")]
    CacheProducer {
        namespace: String,
        key: String,
        message: String,
    },
    #[error("Job {job_id} timed out after {seconds}s")]
    Timeout { job_id: String, seconds: u64 },
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrchestratorError::Validation(message.into())
    }

    pub fn execution(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        OrchestratorError::Execution {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Short stable tag used in reports and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "validation",
            OrchestratorError::NotFound { .. } => "not_found",
            OrchestratorError::Execution { .. } => "execution",
            OrchestratorError::Hook { .. } => "hook",
            OrchestratorError::ConsensusRejected { .. } => "consensus",
            OrchestratorError::CacheProducer { .. } => "cache_producer",
            OrchestratorError::Timeout { .. } => "timeout",
            OrchestratorError::Config(_) => "config",
            OrchestratorError::Io(_) => "io",
            OrchestratorError::Serialization(_) | OrchestratorError::TomlDe(_) => "serialization",
        }
    }

    /// Whether the error must abort a whole run rather than a single job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Validation(_)
                | OrchestratorError::Config(_)
                | OrchestratorError::TomlDe(_)
        )
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrchestratorError::validation("bad").kind(), "validation");
        assert_eq!(
            OrchestratorError::NotFound { kind: "worker", id: "w9".into() }.kind(),
            "not_found"
        );
        assert_eq!(OrchestratorError::execution("backend.1", "boom").kind(), "execution");
        assert_eq!(
            OrchestratorError::Timeout { job_id: "ai.2".into(), seconds: 5 }.kind(),
            "timeout"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(OrchestratorError::validation("bad strategy").is_fatal());
        assert!(!OrchestratorError::execution("frontend.1", "boom").is_fatal());
        assert!(!OrchestratorError::Hook { hook: "pre-push".into(), message: "exit 1".into() }.is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = OrchestratorError::NotFound { kind: "worker", id: "agent042".into() };
        assert_eq!(err.to_string(), "Unknown worker: agent042");

        let err = OrchestratorError::ConsensusRejected {
            hook: "post-test".into(),
            approvals: 2,
            total: 3,
            threshold: 0.7,
        };
        assert_eq!(
            err.to_string(),
            "Hook post-test not validated: 2/3 approvals below threshold 0.70"
        );
    }
}
