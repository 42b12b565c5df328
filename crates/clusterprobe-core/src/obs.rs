//! Structured observability hooks for polling and classification.
//!
//! Events are emitted through `tracing` with an `event` field so they can be
//! filtered by `RUST_LOG` and rendered as JSON by [`crate::telemetry`].

use tracing::{debug, info, warn};

/// Span covering one poll or classification; attach with
/// `tracing::Instrument::instrument`.
pub fn probe_span(kind: &str, subject: &str) -> tracing::Span {
    tracing::info_span!("clusterprobe", kind = %kind, subject = %subject)
}

/// One poll attempt finished.
pub fn emit_poll_attempt(command: &str, attempt: u32, exit_code: i32, matched: bool) {
    debug!(
        event = "poll.attempt",
        command = %command,
        attempt = attempt,
        exit_code = exit_code,
        matched = matched,
    );
}

/// A poll resolved, either matched or out of retries.
pub fn emit_poll_finished(command: &str, attempts: u32, success: bool) {
    if success {
        info!(event = "poll.finished", command = %command, attempts = attempts, success = true);
    } else {
        warn!(event = "poll.finished", command = %command, attempts = attempts, success = false);
    }
}

/// The three cluster facts were collected.
pub fn emit_facts_gathered(credential_mode: &str, infra_platform: &str, auth_issuer: &str) {
    info!(
        event = "facts.gathered",
        credential_mode = %credential_mode,
        infra_platform = %infra_platform,
        auth_issuer = %auth_issuer,
    );
}

/// A predicate was evaluated; `message` is its success or skip text.
pub fn emit_classified(predicate: &str, matched: bool, message: &str) {
    info!(event = "classify.evaluated", predicate = %predicate, matched = matched, "{message}");
}

/// A predicate name was not in the registry.
pub fn emit_unknown_predicate(predicate: &str) {
    warn!(event = "classify.unknown_predicate", predicate = %predicate);
}

/// A restore step was issued for a captured resource.
pub fn emit_restore_action(resource: &str, action: &str, exit_code: i32) {
    info!(
        event = "restore.action",
        resource = %resource,
        action = %action,
        exit_code = exit_code,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_without_subscriber() {
        emit_poll_attempt("oc get pods", 1, 0, false);
        emit_poll_finished("oc get pods", 4, false);
        emit_facts_gathered("Manual", "AWS", "https://issuer");
        emit_classified("isGCPCluster", false, "Not GCP cluster, skip!");
        emit_unknown_predicate("isMarsCluster");
        emit_restore_action("configmap/foo", "delete", 0);
    }

    #[test]
    fn test_probe_span_create() {
        let _entered = probe_span("poll", "oc get pods").entered();
    }
}
