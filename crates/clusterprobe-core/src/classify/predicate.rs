//! Named capability predicates over [`ClusterFacts`].

use std::collections::BTreeMap;

use super::facts::ClusterFacts;

/// Credential mode reported when the cluster uses short-lived, externally
/// issued credentials.
pub const MANUAL_CREDENTIALS_MODE: &str = "Manual";

/// Manual credentials + the given platform + a non-empty issuer.
fn is_manual_with_issuer(
    credential_mode: &str,
    infra_platform: &str,
    auth_issuer: &str,
    platform: &str,
) -> bool {
    credential_mode == MANUAL_CREDENTIALS_MODE
        && infra_platform == platform
        && !auth_issuer.is_empty()
}

/// AWS cluster running in STS mode.
pub fn is_aws_sts(credential_mode: &str, infra_platform: &str, auth_issuer: &str) -> bool {
    is_manual_with_issuer(credential_mode, infra_platform, auth_issuer, "AWS")
}

/// Azure cluster using Workload Identity federation.
pub fn is_azure_wif(credential_mode: &str, infra_platform: &str, auth_issuer: &str) -> bool {
    is_manual_with_issuer(credential_mode, infra_platform, auth_issuer, "Azure")
}

/// GCP cluster using Workload Identity federation.
pub fn is_gcp_wif(credential_mode: &str, infra_platform: &str, auth_issuer: &str) -> bool {
    is_manual_with_issuer(credential_mode, infra_platform, auth_issuer, "GCP")
}

/// Any GCP cluster, whatever its credential mode.
pub fn is_gcp(infra_platform: &str) -> bool {
    infra_platform == "GCP"
}

/// A named predicate plus the messages logged for each verdict.
#[derive(Clone, Copy)]
pub struct CapabilityPredicate {
    pub name: &'static str,
    pub check: fn(&ClusterFacts) -> bool,
    pub success_message: &'static str,
    pub skip_message: &'static str,
}

impl std::fmt::Debug for CapabilityPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityPredicate")
            .field("name", &self.name)
            .field("success_message", &self.success_message)
            .field("skip_message", &self.skip_message)
            .finish_non_exhaustive()
    }
}

impl CapabilityPredicate {
    pub fn evaluate(&self, facts: &ClusterFacts) -> bool {
        (self.check)(facts)
    }

    /// The success or skip message for `matched`.
    pub fn message(&self, matched: bool) -> &'static str {
        if matched {
            self.success_message
        } else {
            self.skip_message
        }
    }
}

pub(crate) const AWS_STS: CapabilityPredicate = CapabilityPredicate {
    name: "isAWSSTSCluster",
    check: |f| is_aws_sts(&f.credential_mode, &f.infra_platform, &f.auth_issuer),
    success_message: "Testing on AWS STS cluster!",
    skip_message: "Not AWS STS cluster, skip!",
};

pub(crate) const AZURE_WIF: CapabilityPredicate = CapabilityPredicate {
    name: "isAzureWIFICluster",
    check: |f| is_azure_wif(&f.credential_mode, &f.infra_platform, &f.auth_issuer),
    success_message: "Testing on Azure WIFI cluster!",
    skip_message: "Not Azure WIFI cluster, skip!",
};

const GCP: CapabilityPredicate = CapabilityPredicate {
    name: "isGCPCluster",
    check: |f| is_gcp(&f.infra_platform),
    success_message: "Testing on GCP cluster!",
    skip_message: "Not GCP cluster, skip!",
};

const GCP_WIF: CapabilityPredicate = CapabilityPredicate {
    name: "isGCPWIFCluster",
    check: |f| is_gcp_wif(&f.credential_mode, &f.infra_platform, &f.auth_issuer),
    success_message: "Testing on GCP WIF cluster!",
    skip_message: "Not GCP WIF cluster, skip!",
};

const STANDARD_PREDICATES: [CapabilityPredicate; 4] = [AWS_STS, AZURE_WIF, GCP, GCP_WIF];

/// Name-keyed predicate lookup.
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    predicates: BTreeMap<String, CapabilityPredicate>,
}

impl PredicateRegistry {
    /// Registry with no predicates; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in predicates: `isAWSSTSCluster`, `isAzureWIFICluster`,
    /// `isGCPCluster`, `isGCPWIFCluster` (also reachable as `isGCPWIFICluster`).
    pub fn standard() -> Self {
        STANDARD_PREDICATES
            .iter()
            .fold(Self::empty(), |registry, predicate| {
                registry.with_predicate(*predicate)
            })
            .with_alias("isGCPWIFICluster", "isGCPWIFCluster")
    }

    /// Register a predicate under its own name, replacing any previous entry.
    pub fn with_predicate(mut self, predicate: CapabilityPredicate) -> Self {
        self.predicates.insert(predicate.name.to_string(), predicate);
        self
    }

    /// Make `target` reachable under `alias` too. No-op if `target` is unknown.
    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        if let Some(predicate) = self.predicates.get(target).copied() {
            self.predicates.insert(alias.to_string(), predicate);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityPredicate> {
        self.predicates.get(name)
    }

    /// Registered names (aliases included), sorted.
    pub fn names(&self) -> Vec<&str> {
        self.predicates.keys().map(String::as_str).collect()
    }
}
