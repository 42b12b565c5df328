//! In-memory `CommandRunner` double (testing only)
//!
//! `ScriptedRunner` hands out scripted results in order and records every
//! command line it receives. Once the script runs out, the last entry repeats;
//! with no script at all it answers an empty zero-exit result.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandOptions, CommandResult, CommandRunner};
use crate::error::{ProbeError, ProbeResult};

#[derive(Debug, Clone)]
enum Scripted {
    Result(CommandResult),
    Error(String),
}

#[derive(Debug, Default)]
struct Script {
    pending: VecDeque<Scripted>,
    last: Option<Scripted>,
    calls: Vec<(String, CommandOptions)>,
}

/// Scripted command runner that records its invocations.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<Script>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result.
    pub fn respond(self, result: CommandResult) -> Self {
        self.push(Scripted::Result(result));
        self
    }

    /// Queue a zero-exit result with the given stdout.
    pub fn respond_stdout(self, stdout: &str) -> Self {
        self.respond(CommandResult::ok(stdout))
    }

    /// Queue a runner-level failure (reported as a spawn error).
    pub fn fail(self, message: &str) -> Self {
        self.push(Scripted::Error(message.to_string()));
        self
    }

    /// Command lines received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(cmd, _)| cmd.clone()).collect()
    }

    /// Options passed alongside each command line.
    pub fn options(&self) -> Vec<CommandOptions> {
        self.lock().calls.iter().map(|(_, opts)| opts.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn push(&self, entry: Scripted) {
        self.lock().pending.push_back(entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command_line: &str,
        options: &CommandOptions,
    ) -> ProbeResult<CommandResult> {
        let next = {
            let mut script = self.lock();
            script
                .calls
                .push((command_line.to_string(), options.clone()));
            match script.pending.pop_front() {
                Some(entry) => {
                    script.last = Some(entry.clone());
                    Some(entry)
                }
                None => script.last.clone(),
            }
        };

        match next {
            Some(Scripted::Result(result)) => Ok(result),
            Some(Scripted::Error(message)) => Err(ProbeError::Spawn {
                command: command_line.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, message),
            }),
            None => Ok(CommandResult::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_in_order_then_repeats_last() {
        let runner = ScriptedRunner::new()
            .respond_stdout("one")
            .respond_stdout("two");
        let opts = CommandOptions::tolerant();

        assert_eq!(runner.run("a", &opts).await.unwrap().stdout, "one");
        assert_eq!(runner.run("b", &opts).await.unwrap().stdout, "two");
        assert_eq!(runner.run("c", &opts).await.unwrap().stdout, "two");
        assert_eq!(runner.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unscripted_returns_empty_success() {
        let runner = ScriptedRunner::new();
        let result = runner
            .run("anything", &CommandOptions::default())
            .await
            .unwrap();
        assert!(result.succeeded());
        assert!(result.stdout.is_empty());
        assert!(runner.options()[0].fail_on_non_zero_exit);
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let runner = ScriptedRunner::new().fail("no such binary");
        let err = runner
            .run("oc get nodes", &CommandOptions::tolerant())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
        assert!(err.to_string().contains("no such binary"));
    }
}
