//! Eventual-consistency polling: re-run a command until its stdout contains
//! an expected marker, or give up after a fixed retry budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{run_best_effort, CommandResult, CommandRunner};
use crate::error::{ProbeError, ProbeResult};
use crate::obs;

/// Retries after the first attempt when none are configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Wait between attempts when none is configured (milliseconds).
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 10_000;

/// Retry budget for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Retries after the first attempt (0 = run once, never wait).
    pub retries: u32,
    /// Fixed delay between attempts (milliseconds).
    pub interval_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_MAX_RETRIES,
            interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl RetryOptions {
    pub fn new(retries: u32, interval_ms: u64) -> Self {
        Self {
            retries,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Most commands a poll with these options will issue.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Stdout contained the expected marker on attempt `attempts`.
    Success { attempts: u32 },
    /// Every attempt missed; carries the final observation.
    Exhausted {
        attempts: u32,
        last_result: CommandResult,
    },
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Polls a command through a [`CommandRunner`].
///
/// Only stdout is inspected, with a literal case-sensitive substring test.
/// A non-zero exit is just another miss. An empty `expected_output` matches
/// on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPoller<R> {
    runner: R,
    command_timeout_ms: Option<u64>,
}

impl<R: CommandRunner> RetryPoller<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            command_timeout_ms: None,
        }
    }

    /// Bound each individual command; a timed-out attempt counts as a miss.
    pub fn with_command_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.command_timeout_ms = timeout_ms;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Poll `command` until stdout contains `expected_output`.
    ///
    /// Issues at most `options.retries + 1` commands and sleeps
    /// `options.interval_ms` between them. Never returns an error.
    pub async fn run(
        &self,
        command: &str,
        expected_output: &str,
        options: RetryOptions,
    ) -> RetryOutcome {
        let mut attempt: u32 = 0;

        loop {
            let result = run_best_effort(&self.runner, command, self.command_timeout_ms).await;
            let attempts = attempt.saturating_add(1);
            let matched = result.stdout.contains(expected_output);
            obs::emit_poll_attempt(command, attempts, result.exit_code, matched);

            if matched {
                obs::emit_poll_finished(command, attempts, true);
                return RetryOutcome::Success { attempts };
            }

            if attempt < options.retries {
                tokio::time::sleep(options.interval()).await;
                attempt += 1;
            } else {
                obs::emit_poll_finished(command, attempts, false);
                return RetryOutcome::Exhausted {
                    attempts,
                    last_result: result,
                };
            }
        }
    }

    /// Like [`run`](Self::run), but an exhausted budget is an error.
    pub async fn assert(
        &self,
        command: &str,
        expected_output: &str,
        options: RetryOptions,
    ) -> ProbeResult<()> {
        match self.run(command, expected_output, options).await {
            RetryOutcome::Success { .. } => Ok(()),
            RetryOutcome::Exhausted { .. } => Err(ProbeError::ConditionNotMet {
                command: command.to_string(),
                expected: expected_output.to_string(),
                retries: options.retries,
            }),
        }
    }
}
