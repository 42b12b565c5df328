//! Registry-driven classification over freshly gathered cluster facts.

use tracing::Instrument;

use crate::command::{run_best_effort, CommandRunner};
use crate::config::ProbeConfig;
use crate::obs;

use super::facts::{ClusterFacts, FactQueries};
use super::platform::PlatformQueries;
use super::predicate::{is_aws_sts, is_azure_wif, PredicateRegistry, AWS_STS, AZURE_WIF};

/// Answers "does the target cluster have capability X".
///
/// Nothing is cached: every call re-reads the cluster, since its state can
/// change between calls.
#[derive(Debug, Clone)]
pub struct ClusterClassifier<R> {
    pub(crate) runner: R,
    queries: FactQueries,
    pub(crate) platform_queries: PlatformQueries,
    registry: PredicateRegistry,
    pub(crate) command_timeout_ms: Option<u64>,
}

impl<R: CommandRunner> ClusterClassifier<R> {
    /// Classifier with the standard queries (`oc`) and predicate registry.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            queries: FactQueries::default(),
            platform_queries: PlatformQueries::default(),
            registry: PredicateRegistry::standard(),
            command_timeout_ms: None,
        }
    }

    /// Classifier whose queries target `config.cli_binary`.
    pub fn from_config(runner: R, config: &ProbeConfig) -> Self {
        Self::new(runner)
            .with_queries(FactQueries::for_cli(&config.cli_binary))
            .with_platform_queries(PlatformQueries::for_cli(&config.cli_binary))
            .with_command_timeout_ms(config.command_timeout_ms)
    }

    pub fn with_queries(mut self, queries: FactQueries) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_platform_queries(mut self, queries: PlatformQueries) -> Self {
        self.platform_queries = queries;
        self
    }

    pub fn with_registry(mut self, registry: PredicateRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_command_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.command_timeout_ms = timeout_ms;
        self
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Read credential mode, infra platform and auth issuer, strictly in
    /// that order. A failed query contributes whatever stdout it produced.
    pub async fn gather_facts(&self) -> ClusterFacts {
        let timeout = self.command_timeout_ms;
        let credential_mode =
            run_best_effort(&self.runner, &self.queries.credential_mode, timeout).await;
        let infra_platform =
            run_best_effort(&self.runner, &self.queries.infra_platform, timeout).await;
        let auth_issuer = run_best_effort(&self.runner, &self.queries.auth_issuer, timeout).await;

        let facts = ClusterFacts::new(
            &credential_mode.stdout,
            &infra_platform.stdout,
            &auth_issuer.stdout,
        );
        obs::emit_facts_gathered(
            &facts.credential_mode,
            &facts.infra_platform,
            &facts.auth_issuer,
        );
        facts
    }

    /// Evaluate the predicate registered as `predicate_name`.
    ///
    /// Returns `None` (after logging) when no such predicate exists; callers
    /// must not read that as a negative answer. No cluster query is issued
    /// in that case.
    pub async fn classify(&self, predicate_name: &str) -> Option<bool> {
        let Some(predicate) = self.registry.get(predicate_name).copied() else {
            obs::emit_unknown_predicate(predicate_name);
            return None;
        };

        async {
            let facts = self.gather_facts().await;
            let matched = predicate.evaluate(&facts);
            obs::emit_classified(predicate.name, matched, predicate.message(matched));
            Some(matched)
        }
        .instrument(obs::probe_span("classify", predicate_name))
        .await
    }
}

/// [`is_aws_sts`] with the success/skip message logged.
pub fn check_aws_sts(credential_mode: &str, infra_platform: &str, auth_issuer: &str) -> bool {
    let matched = is_aws_sts(credential_mode, infra_platform, auth_issuer);
    obs::emit_classified(AWS_STS.name, matched, AWS_STS.message(matched));
    matched
}

/// [`is_azure_wif`] with the success/skip message logged.
pub fn check_azure_wif(credential_mode: &str, infra_platform: &str, auth_issuer: &str) -> bool {
    let matched = is_azure_wif(credential_mode, infra_platform, auth_issuer);
    obs::emit_classified(AZURE_WIF.name, matched, AZURE_WIF.message(matched));
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandResult;
    use crate::fakes::ScriptedRunner;
    use std::sync::Arc;

    fn scripted(facts: [&str; 3]) -> Arc<ScriptedRunner> {
        Arc::new(
            ScriptedRunner::new()
                .respond_stdout(facts[0])
                .respond_stdout(facts[1])
                .respond_stdout(facts[2]),
        )
    }

    #[tokio::test]
    async fn test_gather_facts_in_order_and_trimmed() {
        let runner = scripted(["Manual\n", " AWS ", "https://issuer\n"]);
        let classifier = ClusterClassifier::new(runner.clone());

        let facts = classifier.gather_facts().await;

        assert_eq!(facts, ClusterFacts::new("Manual", "AWS", "https://issuer"));
        let queries = FactQueries::default();
        assert_eq!(
            runner.calls(),
            vec![
                queries.credential_mode,
                queries.infra_platform,
                queries.auth_issuer
            ]
        );
        assert!(runner
            .options()
            .iter()
            .all(|opts| !opts.fail_on_non_zero_exit));
    }

    #[tokio::test]
    async fn test_classify_gcp_on_aws_cluster_is_false() {
        let runner = scripted(["Manual", "AWS", "https://issuer"]);
        let classifier = ClusterClassifier::new(runner.clone());

        assert_eq!(classifier.classify("isGCPCluster").await, Some(false));
        assert_eq!(runner.call_count(), 3);
    }

    #[tokio::test]
    async fn test_classify_gcp_ignores_credential_mode() {
        let runner = scripted(["Mint", "GCP", ""]);
        let classifier = ClusterClassifier::new(runner);
        assert_eq!(classifier.classify("isGCPCluster").await, Some(true));
    }

    #[tokio::test]
    async fn test_classify_gcp_wif_alias() {
        let runner = scripted(["Manual", "GCP", "https://issuer"]);
        let classifier = ClusterClassifier::new(runner);
        assert_eq!(classifier.classify("isGCPWIFICluster").await, Some(true));
    }

    #[tokio::test]
    async fn test_unknown_predicate_issues_no_queries() {
        let runner = Arc::new(ScriptedRunner::new());
        let classifier = ClusterClassifier::new(runner.clone());

        assert_eq!(classifier.classify("isMarsCluster").await, None);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_query_degrades_fact() {
        let degraded = || {
            Arc::new(
                ScriptedRunner::new()
                    .respond_stdout("Manual")
                    .respond(CommandResult::new(1, "", "forbidden"))
                    .fail("connection refused"),
            )
        };

        let facts = ClusterClassifier::new(degraded()).gather_facts().await;
        assert_eq!(facts, ClusterFacts::new("Manual", "", ""));

        let classifier = ClusterClassifier::new(degraded());
        assert_eq!(classifier.classify("isAWSSTSCluster").await, Some(false));
    }

    #[test]
    fn test_check_variants_match_pure_functions() {
        assert!(check_aws_sts("Manual", "AWS", "https://issuer"));
        assert!(!check_aws_sts("Manual", "AWS", ""));
        assert!(check_azure_wif("Manual", "Azure", "https://issuer"));
        assert!(!check_azure_wif("Mint", "Azure", "https://issuer"));
    }

    #[test]
    fn test_from_config_uses_cli_binary() {
        let config = ProbeConfig {
            cli_binary: "kubectl".into(),
            ..ProbeConfig::default()
        };
        let classifier = ClusterClassifier::from_config(ScriptedRunner::new(), &config);
        assert!(classifier
            .queries
            .credential_mode
            .starts_with("kubectl get cloudcredential"));
    }
}
