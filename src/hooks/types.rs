use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OrchestratorError;

/// Lifecycle points an external command can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookType {
    PreStart,
    PostStart,
    PreScaffold,
    PostScaffold,
    PreAgentAssign,
    PostAgentAssign,
    PreAgentReview,
    PostAgentReview,
    PreCommit,
    PostCommit,
    PrePush,
    PostPush,
    PreMerge,
    PostMerge,
    PreBuild,
    PostBuild,
    PreTest,
    PostTest,
    PreDeploy,
    PostDeploy,
    OnError,
    OnSuccess,
    OnWarning,
    OnComplete,
}

impl HookType {
    pub const ALL: [HookType; 24] = [
        HookType::PreStart,
        HookType::PostStart,
        HookType::PreScaffold,
        HookType::PostScaffold,
        HookType::PreAgentAssign,
        HookType::PostAgentAssign,
        HookType::PreAgentReview,
        HookType::PostAgentReview,
        HookType::PreCommit,
        HookType::PostCommit,
        HookType::PrePush,
        HookType::PostPush,
        HookType::PreMerge,
        HookType::PostMerge,
        HookType::PreBuild,
        HookType::PostBuild,
        HookType::PreTest,
        HookType::PostTest,
        HookType::PreDeploy,
        HookType::PostDeploy,
        HookType::OnError,
        HookType::OnSuccess,
        HookType::OnWarning,
        HookType::OnComplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookType::PreStart => "pre-start",
            HookType::PostStart => "post-start",
            HookType::PreScaffold => "pre-scaffold",
            HookType::PostScaffold => "post-scaffold",
            HookType::PreAgentAssign => "pre-agent-assign",
            HookType::PostAgentAssign => "post-agent-assign",
            HookType::PreAgentReview => "pre-agent-review",
            HookType::PostAgentReview => "post-agent-review",
            HookType::PreCommit => "pre-commit",
            HookType::PostCommit => "post-commit",
            HookType::PrePush => "pre-push",
            HookType::PostPush => "post-push",
            HookType::PreMerge => "pre-merge",
            HookType::PostMerge => "post-merge",
            HookType::PreBuild => "pre-build",
            HookType::PostBuild => "post-build",
            HookType::PreTest => "pre-test",
            HookType::PostTest => "post-test",
            HookType::PreDeploy => "pre-deploy",
            HookType::PostDeploy => "post-deploy",
            HookType::OnError => "on-error",
            HookType::OnSuccess => "on-success",
            HookType::OnWarning => "on-warning",
            HookType::OnComplete => "on-complete",
        }
    }

    /// Event hooks fire in reaction to other outcomes rather than around a transition
    pub fn is_event(self) -> bool {
        matches!(
            self,
            HookType::OnError | HookType::OnSuccess | HookType::OnWarning | HookType::OnComplete
        )
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        HookType::ALL
            .iter()
            .copied()
            .find(|hook| hook.as_str() == normalized)
            .ok_or_else(|| OrchestratorError::validation(format!("unknown hook type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for hook in HookType::ALL {
            assert_eq!(hook.as_str().parse::<HookType>().unwrap(), hook);
            let json = serde_json::to_string(&hook).unwrap();
            assert_eq!(json, format!("\"{}\"", hook.as_str()));
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_underscores() {
        assert_eq!("POST_TEST".parse::<HookType>().unwrap(), HookType::PostTest);
        assert_eq!(" pre-agent-assign ".parse::<HookType>().unwrap(), HookType::PreAgentAssign);
        assert!("post-lunch".parse::<HookType>().is_err());
    }

    #[test]
    fn test_event_hooks() {
        assert!(HookType::OnError.is_event());
        assert!(HookType::OnComplete.is_event());
        assert!(!HookType::PreDeploy.is_event());
    }
}
