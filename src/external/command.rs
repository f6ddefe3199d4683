//! Base command execution abstraction
//!
//! Provides the foundational trait for executing external commands, enabling
//! dependency injection for testing. Hook commands and command-backed workers
//! both run through it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// What to run: an executable on disk, or an inline shell snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Script(PathBuf),
    Inline(String),
}

impl CommandSpec {
    /// Existing files are treated as scripts, anything else as inline shell.
    pub fn parse(raw: &str) -> Self {
        let path = PathBuf::from(raw.trim());
        if path.is_file() {
            CommandSpec::Script(path)
        } else {
            CommandSpec::Inline(raw.to_string())
        }
    }

    pub fn display(&self) -> String {
        match self {
            CommandSpec::Script(path) => path.display().to_string(),
            CommandSpec::Inline(command) => command.clone(),
        }
    }
}

/// A fully described command invocation
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub spec: CommandSpec,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            env: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Trait for executing external commands
///
/// This abstraction allows the rest of the codebase to execute commands
/// without directly depending on tokio::process::Command, enabling testing
/// with mock implementations.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError>;
}

/// Real implementation using tokio::process::Command
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl ProcessCommandExecutor {
    fn build(spec: &CommandSpec) -> Command {
        match spec {
            CommandSpec::Script(path) => Command::new(path),
            CommandSpec::Inline(script) => {
                if cfg!(windows) {
                    let mut command = Command::new("cmd");
                    command.arg("/C").arg(script);
                    command
                } else {
                    let mut command = Command::new("sh");
                    command.arg("-c").arg(script);
                    command
                }
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError> {
        let mut command = Self::build(&request.spec);
        command
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let started = Instant::now();
        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::CommandNotFound {
                    command: request.spec.display(),
                }
            } else {
                CommandError::Io { message: e.to_string() }
            }
        })?;

        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| CommandError::Io { message: e.to_string() })?;

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_command_executor_success() {
        let executor = ProcessCommandExecutor;
        let request = CommandRequest::new(CommandSpec::Inline("echo hello".into()));
        let output = executor.execute(&request).await.unwrap();

        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_environment_is_passed_through() {
        let executor = ProcessCommandExecutor;
        let request = CommandRequest::new(CommandSpec::Inline("echo \"$HOOK_TYPE\"".into()))
            .with_env(vec![("HOOK_TYPE".into(), "pre-push".into())]);
        let output = executor.execute(&request).await.unwrap();

        assert_eq!(output.stdout.trim(), "pre-push");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported_not_raised() {
        let executor = ProcessCommandExecutor;
        let request = CommandRequest::new(CommandSpec::Inline("echo oops >&2; exit 3".into()));
        let output = executor.execute(&request).await.unwrap();

        assert!(!output.success());
        assert_eq!(output.status_code, 3);
        assert!(output.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_process_command_executor_command_not_found() {
        let executor = ProcessCommandExecutor;
        let request = CommandRequest::new(CommandSpec::Script(PathBuf::from(
            "/nonexistent/command_xyz",
        )));
        let result = executor.execute(&request).await;

        assert!(matches!(result.unwrap_err(), CommandError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_slow_command() {
        let executor = ProcessCommandExecutor;
        let request = CommandRequest::new(CommandSpec::Inline("sleep 5".into()))
            .with_timeout(Some(Duration::from_millis(100)));
        let result = executor.execute(&request).await;

        assert_eq!(result.unwrap_err(), CommandError::Timeout { timeout_ms: 100 });
    }

    #[test]
    fn test_spec_parse_prefers_existing_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let spec = CommandSpec::parse(file.path().to_str().unwrap());
        assert!(matches!(spec, CommandSpec::Script(_)));

        let spec = CommandSpec::parse("echo inline");
        assert_eq!(spec, CommandSpec::Inline("echo inline".into()));
    }
}
