//! Reviewer quorum for gated lifecycle transitions
//!
//! A successful run of a gated hook is only treated as validated when enough
//! reviewers approve. Reviewers are opaque role names; how a verdict is
//! reached is decided by an injected [`ReviewerPolicy`].

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::context::HookContext;
use super::types::HookType;
use crate::config::ConsensusConfig;

const DEFAULT_REVIEWERS: [&str; 3] = ["code-reviewer", "qa-engineer", "architect"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject { reason: String },
}

impl Verdict {
    pub fn is_approval(&self) -> bool {
        matches!(self, Verdict::Approve)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerVerdict {
    pub reviewer: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// What a reviewer gets to look at
#[derive(Debug, Clone)]
pub struct ReviewRequest<'a> {
    pub hook_type: HookType,
    pub context: &'a HookContext,
    pub exit_code: Option<i32>,
    pub stdout: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub approvals: usize,
    pub total: usize,
    pub threshold: f64,
    pub validated: bool,
    pub verdicts: Vec<ReviewerVerdict>,
}

impl ConsensusResult {
    pub fn from_verdicts(verdicts: Vec<ReviewerVerdict>, threshold: f64) -> Self {
        let total = verdicts.len();
        let approvals = verdicts.iter().filter(|v| v.verdict.is_approval()).count();
        let validated = total > 0 && approvals as f64 / total as f64 >= threshold;
        Self {
            approvals,
            total,
            threshold,
            validated,
            verdicts,
        }
    }

    pub fn approval_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.approvals as f64 / self.total as f64
        }
    }
}

/// Renders one reviewer's verdict
#[async_trait]
pub trait ReviewerPolicy: Send + Sync {
    async fn review(&self, reviewer: &str, request: &ReviewRequest<'_>) -> Verdict;
}

/// Every reviewer approves
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproveAll;

#[async_trait]
impl ReviewerPolicy for ApproveAll {
    async fn review(&self, _reviewer: &str, _request: &ReviewRequest<'_>) -> Verdict {
        Verdict::Approve
    }
}

/// Explicit verdict per reviewer, falling back to a default
#[derive(Debug, Clone)]
pub struct ScriptedReviewerPolicy {
    verdicts: HashMap<String, bool>,
    default_approve: bool,
}

impl ScriptedReviewerPolicy {
    pub fn new(default_approve: bool) -> Self {
        Self {
            verdicts: HashMap::new(),
            default_approve,
        }
    }

    pub fn approve(mut self, reviewer: &str) -> Self {
        self.verdicts.insert(reviewer.to_string(), true);
        self
    }

    pub fn reject(mut self, reviewer: &str) -> Self {
        self.verdicts.insert(reviewer.to_string(), false);
        self
    }
}

#[async_trait]
impl ReviewerPolicy for ScriptedReviewerPolicy {
    async fn review(&self, reviewer: &str, _request: &ReviewRequest<'_>) -> Verdict {
        let approve = self
            .verdicts
            .get(reviewer)
            .copied()
            .unwrap_or(self.default_approve);
        if approve {
            Verdict::Approve
        } else {
            Verdict::Reject {
                reason: format!("{reviewer} rejected the transition"),
            }
        }
    }
}

/// Simulated reviewers: each approves with a fixed probability
#[derive(Debug)]
pub struct RandomReviewerPolicy {
    approval_rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomReviewerPolicy {
    pub fn new(approval_rate: f64) -> Self {
        Self {
            approval_rate: approval_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(approval_rate: f64, seed: u64) -> Self {
        Self {
            approval_rate: approval_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl ReviewerPolicy for RandomReviewerPolicy {
    async fn review(&self, reviewer: &str, _request: &ReviewRequest<'_>) -> Verdict {
        let approve = self.rng.lock().random_bool(self.approval_rate);
        if approve {
            Verdict::Approve
        } else {
            Verdict::Reject {
                reason: format!("{reviewer} found issues"),
            }
        }
    }
}

/// Build the policy named in configuration
pub fn policy_from_config(config: &ConsensusConfig) -> Arc<dyn ReviewerPolicy> {
    match config.policy.as_str() {
        "random" => match config.seed {
            Some(seed) => Arc::new(RandomReviewerPolicy::seeded(config.approval_rate, seed)),
            None => Arc::new(RandomReviewerPolicy::new(config.approval_rate)),
        },
        other => {
            if other != "approve-all" {
                tracing::warn!(policy = other, "Unknown reviewer policy, approving all");
            }
            Arc::new(ApproveAll)
        }
    }
}

/// Selects reviewers for a lifecycle point and tallies their verdicts
pub struct ConsensusValidator {
    threshold: f64,
    gated: HashSet<HookType>,
    rules: HashMap<HookType, Vec<String>>,
    critical_reviewers: Vec<String>,
    policy: Arc<dyn ReviewerPolicy>,
}

impl ConsensusValidator {
    pub fn from_config(config: &ConsensusConfig, policy: Arc<dyn ReviewerPolicy>) -> Self {
        let rules = config
            .rules
            .iter()
            .filter_map(|(name, reviewers)| match name.parse::<HookType>() {
                Ok(hook) => Some((hook, reviewers.clone())),
                Err(_) => {
                    tracing::warn!(hook = %name, "Ignoring consensus rule for unknown hook");
                    None
                }
            })
            .collect();

        Self {
            threshold: config.threshold,
            gated: config.gated.iter().copied().collect(),
            rules,
            critical_reviewers: config.critical_reviewers.clone(),
            policy,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ReviewerPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_gated(&self, hook_type: HookType) -> bool {
        self.gated.contains(&hook_type)
    }

    /// Rule reviewers (or the defaults) followed by critical reviewers, de-duplicated
    pub fn select_reviewers(&self, hook_type: HookType) -> Vec<String> {
        let base: Vec<String> = match self.rules.get(&hook_type) {
            Some(reviewers) => reviewers.clone(),
            None => DEFAULT_REVIEWERS.iter().map(|r| r.to_string()).collect(),
        };

        let mut seen = HashSet::new();
        base.into_iter()
            .chain(self.critical_reviewers.iter().cloned())
            .filter(|reviewer| seen.insert(reviewer.clone()))
            .collect()
    }

    pub async fn validate(&self, request: &ReviewRequest<'_>) -> ConsensusResult {
        let reviewers = self.select_reviewers(request.hook_type);
        let verdicts = join_all(reviewers.iter().map(|reviewer| async move {
            ReviewerVerdict {
                reviewer: reviewer.clone(),
                verdict: self.policy.review(reviewer, request).await,
            }
        }))
        .await;

        for verdict in &verdicts {
            debug!(hook = %request.hook_type, reviewer = %verdict.reviewer, verdict = ?verdict.verdict, "Reviewer verdict");
        }

        let result = ConsensusResult::from_verdicts(verdicts, self.threshold);
        info!(
            hook = %request.hook_type,
            approvals = result.approvals,
            total = result.total,
            threshold = result.threshold,
            validated = result.validated,
            "Consensus round complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator(policy: Arc<dyn ReviewerPolicy>) -> ConsensusValidator {
        ConsensusValidator::from_config(&ConsensusConfig::default(), policy)
    }

    #[test]
    fn test_threshold_boundaries() {
        let verdict = |name: &str, ok: bool| ReviewerVerdict {
            reviewer: name.into(),
            verdict: if ok {
                Verdict::Approve
            } else {
                Verdict::Reject { reason: "no".into() }
            },
        };

        let two_of_three = ConsensusResult::from_verdicts(
            vec![verdict("a", true), verdict("b", true), verdict("c", false)],
            0.7,
        );
        assert!(!two_of_three.validated);

        let seven_of_ten = ConsensusResult::from_verdicts(
            (0..10).map(|i| verdict(&i.to_string(), i < 7)).collect(),
            0.7,
        );
        assert!(seven_of_ten.validated);

        let nobody = ConsensusResult::from_verdicts(Vec::new(), 0.0);
        assert!(!nobody.validated);
    }

    #[test]
    fn test_reviewer_selection_adds_critical_without_duplicates() {
        let mut config = ConsensusConfig::default();
        config.critical_reviewers = vec!["security-auditor".into(), "code-reviewer".into()];
        let validator = ConsensusValidator::from_config(&config, Arc::new(ApproveAll));

        assert_eq!(
            validator.select_reviewers(HookType::PostTest),
            vec!["qa-engineer", "test-automation", "code-reviewer", "security-auditor"]
        );
        assert_eq!(
            validator.select_reviewers(HookType::PreMerge),
            vec!["code-reviewer", "qa-engineer", "architect", "security-auditor"]
        );
    }

    #[test]
    fn test_default_gated_points() {
        let validator = validator(Arc::new(ApproveAll));
        assert!(validator.is_gated(HookType::PostCommit));
        assert!(validator.is_gated(HookType::PrePush));
        assert!(validator.is_gated(HookType::PreDeploy));
        assert!(validator.is_gated(HookType::PostTest));
        assert!(!validator.is_gated(HookType::PreStart));
    }

    #[tokio::test]
    async fn test_scripted_rejection_below_quorum() {
        let policy = ScriptedReviewerPolicy::new(true).reject("code-reviewer");
        let validator = validator(Arc::new(policy));
        let ctx = HookContext::build(HookType::PostTest, "test", &json!({}));
        let request = ReviewRequest {
            hook_type: HookType::PostTest,
            context: &ctx,
            exit_code: Some(0),
            stdout: "",
        };

        let result = validator.validate(&request).await;
        assert_eq!(result.approvals, 2);
        assert_eq!(result.total, 3);
        assert!(!result.validated);
        assert!(result.approval_ratio() < 0.7);
    }

    #[tokio::test]
    async fn test_seeded_random_policy_is_reproducible() {
        let ctx = HookContext::build(HookType::PreDeploy, "test", &json!({}));
        let request = ReviewRequest {
            hook_type: HookType::PreDeploy,
            context: &ctx,
            exit_code: Some(0),
            stdout: "",
        };

        let a = validator(Arc::new(RandomReviewerPolicy::seeded(0.5, 42)))
            .validate(&request)
            .await;
        let b = validator(Arc::new(RandomReviewerPolicy::seeded(0.5, 42)))
            .validate(&request)
            .await;
        assert_eq!(a.approvals, b.approvals);

        let always = validator(Arc::new(RandomReviewerPolicy::seeded(1.0, 7)))
            .validate(&request)
            .await;
        assert!(always.validated);
    }
}
