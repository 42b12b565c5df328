//! Command execution: the `CommandRunner` seam, a shell-backed runner, and
//! the admin CLI decorator that targets a specific kubeconfig.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ProbeError, ProbeResult};

/// Exit code reported when a process produced no code (killed by a signal)
/// or could not be run at all.
pub const NO_EXIT_CODE: i32 = -1;

/// Captured outcome of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout, untrimmed.
    pub stdout: String,

    /// Captured stderr, untrimmed.
    pub stderr: String,
}

impl CommandResult {
    /// Build a result from its three parts.
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A zero-exit result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }

    /// Whether the command exited with code 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Fold a runner-level failure into an empty-stdout result.
    pub fn from_runner_error(err: &ProbeError) -> Self {
        Self::new(NO_EXIT_CODE, "", err.to_string())
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Working directory for the child process.
    pub cwd: Option<PathBuf>,

    /// Return `ProbeError::CommandFailed` on a non-zero exit.
    pub fail_on_non_zero_exit: bool,

    /// Upper bound on a single invocation (milliseconds).
    pub timeout_ms: Option<u64>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            fail_on_non_zero_exit: true,
            timeout_ms: None,
        }
    }
}

impl CommandOptions {
    /// Options that never fail on exit code; the polling and classification
    /// layers always use these.
    pub fn tolerant() -> Self {
        Self {
            fail_on_non_zero_exit: false,
            ..Self::default()
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Executes a command line and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command_line: &str, options: &CommandOptions)
        -> ProbeResult<CommandResult>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    async fn run(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> ProbeResult<CommandResult> {
        (**self).run(command_line, options).await
    }
}

#[async_trait]
impl<'a, R: CommandRunner + ?Sized> CommandRunner for &'a R {
    async fn run(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> ProbeResult<CommandResult> {
        (**self).run(command_line, options).await
    }
}

/// Run `command_line` with tolerant options, folding runner errors
/// (spawn failure, timeout) into a degraded `CommandResult`.
pub(crate) async fn run_best_effort<R: CommandRunner + ?Sized>(
    runner: &R,
    command_line: &str,
    timeout_ms: Option<u64>,
) -> CommandResult {
    let options = CommandOptions {
        timeout_ms,
        ..CommandOptions::tolerant()
    };
    match runner.run(command_line, &options).await {
        Ok(result) => result,
        Err(err) => {
            warn!(event = "command.error", command = %command_line, error = %err);
            CommandResult::from_runner_error(&err)
        }
    }
}

/// Runs command lines through a POSIX shell (`sh -c` by default).
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::with_shell("sh")
    }
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell program; it must accept `-c <command>`.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> ProbeResult<CommandResult> {
        let start = Instant::now();

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| ProbeError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

        let output = match options.timeout_ms {
            Some(timeout_ms) => tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ProbeError::CommandTimeout {
                command: command_line.to_string(),
                timeout_ms,
            })??,
            None => child.wait_with_output().await?,
        };

        let result = CommandResult {
            exit_code: output.status.code().unwrap_or(NO_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!(
            event = "command.finished",
            command = %command_line,
            exit_code = result.exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
        );

        if options.fail_on_non_zero_exit && !result.succeeded() {
            return Err(ProbeError::CommandFailed {
                command: command_line.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        Ok(result)
    }
}

/// Points every command at the admin kubeconfig before delegating.
#[derive(Debug, Clone)]
pub struct AdminCli<R> {
    inner: R,
    kubeconfig: Option<PathBuf>,
}

impl<R: CommandRunner> AdminCli<R> {
    pub fn new(inner: R, kubeconfig: Option<PathBuf>) -> Self {
        Self { inner, kubeconfig }
    }

    /// The command line actually handed to the inner runner.
    pub fn command_line(&self, command: &str) -> String {
        match &self.kubeconfig {
            Some(path) => format!("{command} --kubeconfig {}", path.display()),
            None => command.to_string(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: CommandRunner> CommandRunner for AdminCli<R> {
    async fn run(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> ProbeResult<CommandResult> {
        info!("Run admin command: {command_line}");
        let full = self.command_line(command_line);
        self.inner.run(&full, options).await
    }
}
