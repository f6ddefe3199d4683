use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::hooks::HookType;

/// Main configuration structure for the orchestrator
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Batch scheduling settings
    pub scheduler: SchedulerConfig,
    /// Task decomposition settings
    pub decomposer: DecomposerConfig,
    /// TTL cache settings
    pub cache: CacheConfig,
    /// Lifecycle hook settings
    pub hooks: HookConfig,
    /// Domain tag -> ordered capability roles
    pub capabilities: CapabilityConfig,
    /// Task type -> capability role
    pub task_roles: TaskRoleConfig,
    /// Worker roster used by the command line entry point
    pub workers: Vec<WorkerSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive (overridden by RUST_LOG)
    pub log_level: String,
    /// Emit JSON structured logs instead of compact text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Global bound on concurrently running jobs
    pub max_concurrent_jobs: usize,
    /// Worker budget used by the smart strategy (defaults to registered worker count)
    pub worker_budget: Option<usize>,
    /// Pause between consecutive batches
    pub batch_cooldown_ms: u64,
    /// Per-job timeout for the injected operation
    pub job_timeout_seconds: Option<u64>,
    /// Skip remaining batches once any job has failed
    pub fail_fast: bool,
    /// Upper bound on workers assigned to a single job
    pub max_workers_per_job: usize,
    /// Upper bound on jobs per smart sub-batch
    pub max_smart_batch_size: usize,
    /// Fail a job when its pre-operation hook fails
    pub blocking_pre_hooks: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            worker_budget: None,
            batch_cooldown_ms: 250,
            job_timeout_seconds: None,
            fail_fast: false,
            max_workers_per_job: 10,
            max_smart_batch_size: 3,
            blocking_pre_hooks: false,
        }
    }
}

impl SchedulerConfig {
    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_millis(self.batch_cooldown_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecomposerConfig {
    /// Working hours in one estimated day
    pub hours_per_day: f64,
    /// Days in one delivery iteration
    pub days_per_iteration: u32,
    /// Threshold per numeric id depth; crossing one adds a complexity point
    pub complexity_thresholds: Vec<u32>,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            hours_per_day: 6.0,
            days_per_iteration: 10,
            complexity_thresholds: vec![5, 3],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for namespaces without an explicit entry
    pub default_ttl_seconds: u64,
    /// Maximum entries held per namespace
    pub max_capacity: u64,
    /// Namespace -> TTL in seconds
    pub namespaces: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let namespaces = [
            ("decomposition", 3600),
            ("capabilities", 86_400),
            ("workload", 5),
            ("test-results", 60),
        ]
        .into_iter()
        .map(|(name, ttl)| (name.to_string(), ttl))
        .collect();

        Self {
            default_ttl_seconds: 300,
            max_capacity: 10_000,
            namespaces,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, namespace: &str) -> Duration {
        let seconds = self
            .namespaces
            .get(namespace)
            .copied()
            .unwrap_or(self.default_ttl_seconds);
        Duration::from_secs(seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HookConfig {
    /// Master switch for lifecycle hooks
    pub enabled: bool,
    /// Environment tag passed to every hook
    pub environment: String,
    /// Timeout for a single hook command
    pub timeout_seconds: u64,
    /// Number of invocations kept in history
    pub history_limit: usize,
    /// Directory scanned for scripts named after lifecycle points
    pub hooks_dir: Option<String>,
    /// Lifecycle point name -> executable path or inline command
    pub commands: HashMap<String, String>,
    /// Reviewer quorum settings
    pub consensus: ConsensusConfig,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            environment: "development".to_string(),
            timeout_seconds: 30,
            history_limit: 100,
            hooks_dir: None,
            commands: HashMap::new(),
            consensus: ConsensusConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Fraction of approvals required to validate a transition
    pub threshold: f64,
    /// Lifecycle points whose successful runs require consensus
    pub gated: Vec<HookType>,
    /// Lifecycle point name -> reviewer roles
    pub rules: HashMap<String, Vec<String>>,
    /// Reviewers added to every consensus round
    pub critical_reviewers: Vec<String>,
    /// Reviewer policy: "approve-all" or "random"
    pub policy: String,
    /// Approval probability for the random policy
    pub approval_rate: f64,
    /// Seed for the random policy
    pub seed: Option<u64>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        let rules = [
            ("post-commit", vec!["code-reviewer", "architect", "qa-engineer"]),
            ("pre-push", vec!["code-reviewer", "security-auditor", "devops-engineer"]),
            (
                "pre-deploy",
                vec!["devops-engineer", "security-auditor", "architect", "qa-engineer"],
            ),
            ("post-test", vec!["qa-engineer", "test-automation", "code-reviewer"]),
        ]
        .into_iter()
        .map(|(hook, reviewers)| {
            (
                hook.to_string(),
                reviewers.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        Self {
            threshold: 0.7,
            gated: vec![
                HookType::PostCommit,
                HookType::PrePush,
                HookType::PreDeploy,
                HookType::PostTest,
            ],
            rules,
            critical_reviewers: Vec::new(),
            policy: "approve-all".to_string(),
            approval_rate: 0.8,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CapabilityConfig(pub HashMap<String, Vec<String>>);

impl Default for CapabilityConfig {
    fn default() -> Self {
        let table = [
            (
                "frontend",
                vec!["frontend-developer", "ui-designer", "accessibility-specialist"],
            ),
            (
                "backend",
                vec!["backend-developer", "database-engineer", "api-designer"],
            ),
            ("ai", vec!["ml-engineer", "data-scientist", "prompt-engineer"]),
            (
                "security",
                vec!["security-auditor", "penetration-tester", "compliance-officer"],
            ),
        ]
        .into_iter()
        .map(|(domain, roles)| {
            (
                domain.to_string(),
                roles.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();
        Self(table)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TaskRoleConfig(pub HashMap<String, String>);

impl Default for TaskRoleConfig {
    fn default() -> Self {
        let table = [
            ("design", "architect"),
            ("implementation", "developer"),
            ("testing", "qa-engineer"),
            ("review", "code-reviewer"),
            ("research", "researcher"),
            ("analysis", "analyst"),
            ("integration", "integration-engineer"),
        ]
        .into_iter()
        .map(|(task_type, role)| (task_type.to_string(), role.to_string()))
        .collect();
        Self(table)
    }
}

/// A worker declared in configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkerSpec {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub max_concurrent: Option<u32>,
    /// Shell command run once per task; workers without one only log
    #[serde(default)]
    pub command: Option<String>,
}

impl OrchestratorConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (orchestrator.toml, .orchestrator-rc)
    /// 3. Environment variables (prefixed with ORCHESTRATOR_, nested with __)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("orchestrator.toml").exists() {
            builder = builder.add_source(File::with_name("orchestrator"));
        }

        if Path::new(".orchestrator-rc").exists() {
            builder = builder.add_source(
                File::with_name(".orchestrator-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(Self::environment());

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load defaults overlaid with one explicit TOML file and the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path.as_ref()).format(config::FileFormat::Toml))
            .add_source(Self::environment())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn environment() -> Environment {
        Environment::with_prefix("ORCHESTRATOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> anyhow::Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.scheduler.max_concurrent_jobs, 4);
        assert_eq!(config.scheduler.max_workers_per_job, 10);
        assert!(!config.scheduler.fail_fast);
        assert_eq!(config.decomposer.complexity_thresholds, vec![5, 3]);
        assert!((config.hooks.consensus.threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.hooks.consensus.gated.len(), 4);
        assert!(config.capabilities.0.contains_key("security"));
        assert_eq!(config.task_roles.0.get("testing").map(String::as_str), Some("qa-engineer"));
    }

    #[test]
    fn test_namespace_ttl_lookup() {
        let cache = CacheConfig::default();
        assert_eq!(cache.ttl_for("test-results"), Duration::from_secs(60));
        assert_eq!(cache.ttl_for("decomposition"), Duration::from_secs(3600));
        assert_eq!(cache.ttl_for("unheard-of"), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        std::fs::write(
            &path,
            r#"
[scheduler]
max_concurrent_jobs = 2
fail_fast = true

[hooks]
environment = "staging"

[hooks.commands]
"post-test" = "echo done"

[[workers]]
id = "agent001"
capabilities = ["frontend-developer"]
max_concurrent = 2
"#,
        )
        .unwrap();

        let config = OrchestratorConfig::load_from(&path).unwrap();
        assert_eq!(config.scheduler.max_concurrent_jobs, 2);
        assert!(config.scheduler.fail_fast);
        assert_eq!(config.scheduler.max_workers_per_job, 10);
        assert_eq!(config.hooks.environment, "staging");
        assert_eq!(
            config.hooks.commands.get("post-test").map(String::as_str),
            Some("echo done")
        );
        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].max_concurrent, Some(2));
    }

    #[test]
    fn test_save_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = OrchestratorConfig::default();
        config.scheduler.batch_cooldown_ms = 10;
        config.save_to_file(&path).unwrap();

        let reloaded = OrchestratorConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.scheduler.batch_cooldown_ms, 10);
    }
}
