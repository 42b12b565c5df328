//! The three-fact snapshot a classification runs against.

use serde::{Deserialize, Serialize};

/// Minimal cluster identity snapshot. Built fresh for every classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFacts {
    /// Cloud credential operator mode (e.g. "Manual", "Mint").
    pub credential_mode: String,
    /// Infrastructure platform identifier (e.g. "AWS", "Azure", "GCP").
    pub infra_platform: String,
    /// Service account issuer URL; empty when unset.
    pub auth_issuer: String,
}

impl ClusterFacts {
    /// Build facts from raw command output, trimming surrounding whitespace.
    pub fn new(credential_mode: &str, infra_platform: &str, auth_issuer: &str) -> Self {
        Self {
            credential_mode: credential_mode.trim().to_string(),
            infra_platform: infra_platform.trim().to_string(),
            auth_issuer: auth_issuer.trim().to_string(),
        }
    }
}

/// Command lines used to read each fact, issued in field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactQueries {
    pub credential_mode: String,
    pub infra_platform: String,
    pub auth_issuer: String,
}

impl Default for FactQueries {
    fn default() -> Self {
        Self::for_cli("oc")
    }
}

impl FactQueries {
    /// Standard queries for the given cluster CLI binary.
    pub fn for_cli(cli: &str) -> Self {
        Self {
            credential_mode: format!(
                "{cli} get cloudcredential cluster --template={{{{.spec.credentialsMode}}}}"
            ),
            infra_platform: format!(
                "{cli} get infrastructure cluster --template={{{{.status.platform}}}}"
            ),
            auth_issuer: format!(
                "{cli} get authentication cluster --template={{{{.spec.serviceAccountIssuer}}}}"
            ),
        }
    }

    /// The queries in the order they must be issued.
    pub fn in_order(&self) -> [&str; 3] {
        [
            self.credential_mode.as_str(),
            self.infra_platform.as_str(),
            self.auth_issuer.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_whitespace() {
        let facts = ClusterFacts::new(" Manual\n", "AWS\n", "  https://issuer  \n");
        assert_eq!(facts.credential_mode, "Manual");
        assert_eq!(facts.infra_platform, "AWS");
        assert_eq!(facts.auth_issuer, "https://issuer");
    }

    #[test]
    fn test_default_queries_use_go_templates() {
        let q = FactQueries::default();
        assert_eq!(
            q.credential_mode,
            "oc get cloudcredential cluster --template={{.spec.credentialsMode}}"
        );
        assert_eq!(
            q.infra_platform,
            "oc get infrastructure cluster --template={{.status.platform}}"
        );
        assert_eq!(
            q.auth_issuer,
            "oc get authentication cluster --template={{.spec.serviceAccountIssuer}}"
        );
    }

    #[test]
    fn test_for_cli_swaps_binary() {
        let q = FactQueries::for_cli("kubectl");
        for query in q.in_order() {
            assert!(query.starts_with("kubectl get "));
        }
    }
}
