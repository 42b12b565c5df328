//! Fixture restore bookkeeping.
//!
//! A [`RestoreContext`] is owned by a test's setup/teardown. Setup captures
//! each resource it is about to touch (did it exist? what did it look like?),
//! the test marks what it changed, and teardown puts things back: resources
//! that were created get deleted, pre-existing ones get their original
//! manifest re-applied. The context can be saved to disk between the two.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::command::{run_best_effort, CommandResult, CommandRunner};
use crate::error::{ProbeError, ProbeResult};
use crate::obs;

/// Reason the cluster CLI prints for a resource that does not exist, as in
/// `Error from server (NotFound): configmaps "x" not found`.
const NOT_FOUND_REASON: &str = "NotFound";

fn is_not_found(result: &CommandResult) -> bool {
    result.stderr.contains(NOT_FOUND_REASON)
}

/// A cluster resource addressed by kind, name and optional namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// Cluster-scoped resource.
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: None,
        }
    }

    pub fn namespaced(kind: &str, name: &str, namespace: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Self::new(kind, name)
        }
    }

    fn scope_args(&self) -> String {
        match &self.namespace {
            Some(ns) => format!(" -n {ns}"),
            None => String::new(),
        }
    }

    /// File name for this resource's saved manifest.
    fn blob_file_name(&self) -> String {
        let raw = match &self.namespace {
            Some(ns) => format!("{ns}_{}_{}", self.kind, self.name),
            None => format!("{}_{}", self.kind, self.name),
        };
        let safe: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{safe}.json")
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}/{}", self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// State of one resource as first seen by setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource: ResourceRef,
    /// Whether the resource existed before the test touched it.
    pub existed: bool,
    /// Whether the test reported changing it.
    pub modified: bool,
    /// Manifest as captured (`-o json`), when it existed.
    pub original: Option<serde_json::Value>,
    pub captured_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    /// What teardown does for this resource.
    pub fn planned_action(&self) -> RestoreAction {
        match (self.modified, self.existed) {
            (false, _) => RestoreAction::Skip,
            (true, true) => RestoreAction::Reapply,
            (true, false) => RestoreAction::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreAction {
    /// Re-apply the captured manifest.
    Reapply,
    /// Delete a resource the test created.
    Delete,
    /// Untouched; nothing to do.
    Skip,
}

impl std::fmt::Display for RestoreAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreAction::Reapply => write!(f, "reapply"),
            RestoreAction::Delete => write!(f, "delete"),
            RestoreAction::Skip => write!(f, "skip"),
        }
    }
}

/// One teardown step and the command it ran, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreStep {
    pub resource: ResourceRef,
    pub action: RestoreAction,
    pub result: Option<CommandResult>,
}

/// Explicit setup/teardown state for resources a test mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreContext {
    cli_binary: String,
    snapshots: Vec<ResourceSnapshot>,
}

impl Default for RestoreContext {
    fn default() -> Self {
        Self::new("oc")
    }
}

impl RestoreContext {
    pub fn new(cli_binary: &str) -> Self {
        Self {
            cli_binary: cli_binary.to_string(),
            snapshots: Vec::new(),
        }
    }

    pub fn snapshots(&self) -> &[ResourceSnapshot] {
        &self.snapshots
    }

    pub fn snapshot(&self, resource: &ResourceRef) -> Option<&ResourceSnapshot> {
        self.snapshots.iter().find(|s| &s.resource == resource)
    }

    /// Record the current state of `resource`.
    ///
    /// A resource is captured once; later calls return the first snapshot so
    /// the original state is never overwritten by the test's own changes.
    ///
    /// Only a `NotFound` answer records the resource as absent. Any other
    /// failed lookup returns [`ProbeError::CommandFailed`] and records
    /// nothing.
    pub async fn capture<R: CommandRunner + ?Sized>(
        &mut self,
        runner: &R,
        resource: ResourceRef,
    ) -> ProbeResult<&ResourceSnapshot> {
        if let Some(index) = self.position(&resource) {
            debug!(resource = %resource, "already captured");
            return Ok(&self.snapshots[index]);
        }

        let command = format!(
            "{} get {} {}{} -o json",
            self.cli_binary,
            resource.kind,
            resource.name,
            resource.scope_args()
        );
        let result = run_best_effort(runner, &command, None).await;

        let original = if result.succeeded() {
            Some(serde_json::from_str::<serde_json::Value>(&result.stdout)?)
        } else if is_not_found(&result) {
            None
        } else {
            // Existence is unknown; recording it as absent would let
            // teardown delete a pre-existing resource.
            return Err(ProbeError::CommandFailed {
                command,
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        };
        info!(
            event = "restore.captured",
            resource = %resource,
            existed = original.is_some(),
        );

        self.snapshots.push(ResourceSnapshot {
            resource,
            existed: original.is_some(),
            modified: false,
            original,
            captured_at: Utc::now(),
        });
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }

    /// Note that the test changed (or created) a captured resource.
    pub fn mark_modified(&mut self, resource: &ResourceRef) -> ProbeResult<()> {
        let index = self
            .position(resource)
            .ok_or_else(|| ProbeError::UnknownResource(resource.to_string()))?;
        self.snapshots[index].modified = true;
        Ok(())
    }

    /// Undo modifications, newest capture first.
    ///
    /// Manifests to re-apply are written under `work_dir`. Cluster commands
    /// run tolerantly and a manifest that cannot be written becomes a failed
    /// step (exit code -1), so one failed step does not stop the rest;
    /// inspect the returned steps for exit codes.
    pub async fn restore<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        work_dir: &Path,
    ) -> ProbeResult<Vec<RestoreStep>> {
        let mut steps = Vec::with_capacity(self.snapshots.len());

        for snapshot in self.snapshots.iter().rev() {
            let action = snapshot.planned_action();
            let command = match action {
                RestoreAction::Skip => None,
                RestoreAction::Delete => Some(format!(
                    "{} delete {} {}{} --ignore-not-found",
                    self.cli_binary,
                    snapshot.resource.kind,
                    snapshot.resource.name,
                    snapshot.resource.scope_args()
                )),
                RestoreAction::Reapply => match self.write_blob(snapshot, work_dir) {
                    Ok(path) => Some(format!("{} apply -f {}", self.cli_binary, path.display())),
                    Err(err) => {
                        warn!(
                            event = "restore.blob_failed",
                            resource = %snapshot.resource,
                            error = %err,
                        );
                        steps.push(RestoreStep {
                            resource: snapshot.resource.clone(),
                            action,
                            result: Some(CommandResult::from_runner_error(&err)),
                        });
                        continue;
                    }
                },
            };

            let result = match command {
                Some(command) => {
                    let result = run_best_effort(runner, &command, None).await;
                    obs::emit_restore_action(
                        &snapshot.resource.to_string(),
                        &action.to_string(),
                        result.exit_code,
                    );
                    Some(result)
                }
                None => None,
            };

            steps.push(RestoreStep {
                resource: snapshot.resource.clone(),
                action,
                result,
            });
        }

        Ok(steps)
    }

    /// Persist the context as pretty JSON.
    pub fn save(&self, path: &Path) -> ProbeResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Load a saved context; `None` when the file does not exist.
    pub fn load_if_exists(path: &Path) -> ProbeResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn position(&self, resource: &ResourceRef) -> Option<usize> {
        self.snapshots.iter().position(|s| &s.resource == resource)
    }

    fn write_blob(&self, snapshot: &ResourceSnapshot, work_dir: &Path) -> ProbeResult<PathBuf> {
        let original = snapshot
            .original
            .as_ref()
            .ok_or_else(|| ProbeError::UnknownResource(snapshot.resource.to_string()))?;
        std::fs::create_dir_all(work_dir)?;
        let path = work_dir.join(snapshot.resource.blob_file_name());
        std::fs::write(&path, serde_json::to_vec_pretty(original)?)?;
        Ok(path)
    }
}
