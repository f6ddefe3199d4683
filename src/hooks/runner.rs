use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::consensus::{policy_from_config, ConsensusValidator, ReviewRequest, ReviewerPolicy};
use super::context::HookContext;
use super::history::{HookHistory, HookInvocation, HookOutcome, HookStats};
use super::types::HookType;
use crate::config::HookConfig;
use crate::error::{OrchestratorError, Result};
use crate::external::{CommandExecutor, CommandRequest, CommandSpec, ProcessCommandExecutor};

/// Runs external commands bound to lifecycle points and records every run
pub struct HookRunner {
    enabled: bool,
    environment: String,
    timeout: Duration,
    bindings: BTreeMap<HookType, CommandSpec>,
    executor: Arc<dyn CommandExecutor>,
    consensus: ConsensusValidator,
    history: Mutex<HookHistory>,
}

impl HookRunner {
    pub fn new(config: &HookConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(ProcessCommandExecutor),
            policy_from_config(&config.consensus),
        )
    }

    pub fn with_parts(
        config: &HookConfig,
        executor: Arc<dyn CommandExecutor>,
        policy: Arc<dyn ReviewerPolicy>,
    ) -> Self {
        Self {
            enabled: config.enabled,
            environment: config.environment.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            bindings: load_bindings(config),
            executor,
            consensus: ConsensusValidator::from_config(&config.consensus, policy),
            history: Mutex::new(HookHistory::new(config.history_limit)),
        }
    }

    pub fn with_reviewer_policy(mut self, policy: Arc<dyn ReviewerPolicy>) -> Self {
        self.consensus = self.consensus.with_policy(policy);
        self
    }

    pub fn with_command_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Bind or rebind a lifecycle point at runtime
    pub fn bind(&mut self, hook_type: HookType, command: &str) {
        self.bindings.insert(hook_type, CommandSpec::parse(command));
    }

    pub fn is_bound(&self, hook_type: HookType) -> bool {
        self.enabled && self.bindings.contains_key(&hook_type)
    }

    pub fn bindings(&self) -> Vec<(HookType, String)> {
        self.bindings
            .iter()
            .map(|(hook, spec)| (*hook, spec.display()))
            .collect()
    }

    pub fn is_gated(&self, hook_type: HookType) -> bool {
        self.consensus.is_gated(hook_type)
    }

    /// Run the command bound to `hook_type`
    ///
    /// Never fails: a failing command is recorded and raises `on-error`, and an
    /// unbound point yields a `NotConfigured` invocation that is not recorded.
    pub async fn run_hook(&self, hook_type: HookType, data: &Value) -> HookInvocation {
        let invocation = self.execute(hook_type, data).await;

        if invocation.outcome == HookOutcome::Failed && hook_type != HookType::OnError {
            let message = invocation
                .error
                .clone()
                .unwrap_or_else(|| "hook failed".to_string());
            let payload = json!({
                "original_hook": hook_type.as_str(),
                "error": message,
                "feature_id": invocation.context.feature_id(),
            });
            self.execute(HookType::OnError, &payload).await;
        }

        invocation
    }

    /// Run a hook that must succeed and, when gated, reach consensus
    pub async fn run_gated(&self, hook_type: HookType, data: &Value) -> Result<HookInvocation> {
        let invocation = self.run_hook(hook_type, data).await;
        match (&invocation.outcome, &invocation.consensus) {
            (HookOutcome::Failed, _) => Err(OrchestratorError::Hook {
                hook: hook_type.to_string(),
                message: invocation
                    .error
                    .clone()
                    .unwrap_or_else(|| "hook failed".to_string()),
            }),
            (_, Some(consensus)) if !consensus.validated => {
                Err(OrchestratorError::ConsensusRejected {
                    hook: hook_type.to_string(),
                    approvals: consensus.approvals,
                    total: consensus.total,
                    threshold: consensus.threshold,
                })
            }
            _ => Ok(invocation),
        }
    }

    async fn execute(&self, hook_type: HookType, data: &Value) -> HookInvocation {
        let context = HookContext::build(hook_type, &self.environment, data);

        let spec = match self.bindings.get(&hook_type) {
            Some(spec) if self.enabled => spec.clone(),
            _ => {
                debug!(hook = %hook_type, "No command bound, skipping");
                return Self::invocation(hook_type, context, None, HookOutcome::NotConfigured);
            }
        };

        let request = CommandRequest::new(spec.clone())
            .with_env(context.to_env())
            .with_cwd(Some(context.working_dir.clone()))
            .with_timeout(Some(self.timeout));

        info!(hook = %hook_type, command = %spec.display(), "Running hook");
        let mut invocation =
            Self::invocation(hook_type, context, Some(spec.display()), HookOutcome::Failed);

        match self.executor.execute(&request).await {
            Ok(output) => {
                invocation.exit_code = Some(output.status_code);
                invocation.duration_ms = output.duration.as_millis() as u64;
                invocation.stdout = output.stdout;
                invocation.stderr = output.stderr;
                if output.status_code == 0 {
                    invocation.outcome = HookOutcome::Succeeded;
                } else {
                    invocation.error = Some(format!("exited with status {}", output.status_code));
                }
            }
            Err(e) => {
                invocation.error = Some(e.to_string());
            }
        }

        if invocation.succeeded() && self.consensus.is_gated(hook_type) {
            let request = ReviewRequest {
                hook_type,
                context: &invocation.context,
                exit_code: invocation.exit_code,
                stdout: &invocation.stdout,
            };
            let result = self.consensus.validate(&request).await;
            invocation.consensus = Some(result);
        }

        match invocation.outcome {
            HookOutcome::Succeeded => info!(
                hook = %hook_type,
                duration_ms = invocation.duration_ms,
                validated = invocation.validated(),
                "Hook finished"
            ),
            _ => warn!(
                hook = %hook_type,
                error = invocation.error.as_deref().unwrap_or_default(),
                "Hook failed"
            ),
        }

        invocation.finished_at = Utc::now();
        self.history.lock().push(invocation.clone());
        invocation
    }

    fn invocation(
        hook_type: HookType,
        context: HookContext,
        command: Option<String>,
        outcome: HookOutcome,
    ) -> HookInvocation {
        HookInvocation {
            id: Uuid::new_v4(),
            hook_type,
            context,
            command,
            outcome,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            error: None,
            consensus: None,
            finished_at: Utc::now(),
        }
    }

    pub fn history(&self) -> Vec<HookInvocation> {
        self.history.lock().snapshot()
    }

    pub fn history_for(&self, hook_type: HookType) -> Vec<HookInvocation> {
        self.history.lock().for_type(hook_type)
    }

    pub fn stats(&self) -> HookStats {
        self.history.lock().stats()
    }
}

fn load_bindings(config: &HookConfig) -> BTreeMap<HookType, CommandSpec> {
    let mut bindings = BTreeMap::new();

    if let Some(dir) = &config.hooks_dir {
        bindings.extend(scan_hooks_dir(Path::new(dir)));
    }

    for (name, command) in &config.commands {
        match name.parse::<HookType>() {
            Ok(hook) => {
                bindings.insert(hook, CommandSpec::parse(command));
            }
            Err(_) => warn!(hook = %name, "Ignoring command for unknown lifecycle point"),
        }
    }

    bindings
}

/// Files named after a lifecycle point (with or without extension) become script bindings
fn scan_hooks_dir(dir: &Path) -> Vec<(HookType, CommandSpec)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot read hooks directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let hook = stem.parse::<HookType>().ok()?;
            Some((hook, CommandSpec::Script(path)))
        })
        .collect()
}
