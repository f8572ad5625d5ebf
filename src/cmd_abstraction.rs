//! Command execution abstraction for testability.
//!
//! `ipset` and the curl/wget availability probe are driven through
//! [`CommandExecutor`], so unit tests can script their behaviour without
//! touching the system.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Whether the command exited with code 0
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Best one-line description of a failure, for error messages.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.lines().next().unwrap_or(stderr).to_string();
        }
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Trait for command execution, allowing dependency injection for testing.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with the given arguments.
    ///
    /// Returns `Err` only when the program could not be started; a non-zero
    /// exit is reported through [`CommandOutput::success`].
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs real system commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        Ok(CommandOutput::from(output))
    }
}

/// Convert a slice of &str to Vec<String>.
///
/// mockall has trouble with the lifetimes in `&[&str]`, so the trait takes `&[String]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Whether `tool` can be started at all (probed with `--version`).
pub fn tool_available(executor: &dyn CommandExecutor, tool: &str) -> bool {
    executor
        .execute(tool, &args_to_strings(&["--version"]))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_strings() {
        let args = args_to_strings(&["list", "-n", "chnroute"]);
        assert_eq!(args, vec!["list", "-n", "chnroute"]);
        assert!(args_to_strings(&[]).is_empty());
    }

    #[test]
    fn test_failure_reason_prefers_first_stderr_line() {
        let output = CommandOutput {
            stderr: "ipset v7.17: Kernel error received: Operation not permitted\nmore\n"
                .to_string(),
            code: Some(1),
            ..Default::default()
        };
        assert_eq!(
            output.failure_reason(),
            "ipset v7.17: Kernel error received: Operation not permitted"
        );
    }

    #[test]
    fn test_failure_reason_falls_back_to_code() {
        let output = CommandOutput {
            code: Some(22),
            ..Default::default()
        };
        assert_eq!(output.failure_reason(), "exit code 22");
        assert_eq!(CommandOutput::default().failure_reason(), "terminated by signal");
    }

    #[test]
    fn test_real_command_executor_execute_echo() {
        let executor = RealCommandExecutor::new();
        let output = executor
            .execute("echo", &args_to_strings(&["-n", "hello"]))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn test_real_command_executor_missing_program() {
        let executor = RealCommandExecutor::new();
        let result = executor.execute("listsync-no-such-tool", &[]);
        assert!(result.is_err());
        assert!(!tool_available(&executor, "listsync-no-such-tool"));
    }

    #[test]
    fn test_tool_available_with_mock() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, args| cmd == "curl" && args == ["--version".to_string()])
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    stdout: "curl 8.5.0".to_string(),
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });
        assert!(tool_available(&mock, "curl"));
    }
}
