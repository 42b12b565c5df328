//! Probe configuration, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::{AdminCli, CommandRunner, ShellCommandRunner};
use crate::error::{ProbeError, ProbeResult};
use crate::poll::RetryOptions;

/// Kubeconfig handed to every admin command.
pub const ENV_KUBECONFIG: &str = "KUBECONFIG_PATH";
/// Cluster CLI binary (default `oc`).
pub const ENV_CLI: &str = "CLUSTERPROBE_CLI";
/// Shell used to run command lines (default `sh`).
pub const ENV_SHELL: &str = "CLUSTERPROBE_SHELL";
/// Per-command timeout in milliseconds (unset = unbounded).
pub const ENV_COMMAND_TIMEOUT_MS: &str = "CLUSTERPROBE_COMMAND_TIMEOUT_MS";
/// Default poll retries.
pub const ENV_RETRIES: &str = "CLUSTERPROBE_RETRIES";
/// Default poll interval in milliseconds.
pub const ENV_RETRY_INTERVAL_MS: &str = "CLUSTERPROBE_RETRY_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Cluster CLI binary used by the built-in queries.
    pub cli_binary: String,
    /// Shell program for `ShellCommandRunner`.
    pub shell: String,
    /// Kubeconfig appended to admin commands.
    pub kubeconfig: Option<PathBuf>,
    /// Bound on each individual command.
    pub command_timeout_ms: Option<u64>,
    /// Default retry budget for polls.
    pub retry: RetryOptions,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cli_binary: "oc".to_string(),
            shell: "sh".to_string(),
            kubeconfig: None,
            command_timeout_ms: None,
            retry: RetryOptions::default(),
        }
    }
}

impl ProbeConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or empty keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(kubeconfig) = get(ENV_KUBECONFIG) {
            config.kubeconfig = Some(PathBuf::from(kubeconfig));
        }
        if let Some(cli) = get(ENV_CLI) {
            config.cli_binary = cli;
        }
        if let Some(shell) = get(ENV_SHELL) {
            config.shell = shell;
        }
        if let Some(raw) = get(ENV_COMMAND_TIMEOUT_MS) {
            config.command_timeout_ms = Some(parse_number(ENV_COMMAND_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = get(ENV_RETRIES) {
            config.retry.retries = parse_number(ENV_RETRIES, &raw)?;
        }
        if let Some(raw) = get(ENV_RETRY_INTERVAL_MS) {
            config.retry.interval_ms = parse_number(ENV_RETRY_INTERVAL_MS, &raw)?;
        }

        Ok(config)
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    /// Shell runner wrapped in the admin kubeconfig decorator.
    pub fn admin_runner(&self) -> AdminCli<ShellCommandRunner> {
        self.admin_runner_over(ShellCommandRunner::with_shell(&self.shell))
    }

    /// Wrap an arbitrary runner in the admin kubeconfig decorator.
    pub fn admin_runner_over<R: CommandRunner>(&self, runner: R) -> AdminCli<R> {
        AdminCli::new(runner, self.kubeconfig.clone())
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> ProbeResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| ProbeError::InvalidConfig(format!("{key}={raw:?}: {err}")))
}
