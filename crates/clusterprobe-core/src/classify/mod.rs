//! Cluster capability classification.
//!
//! Reads a small set of cluster facts through a [`CommandRunner`] and
//! evaluates named boolean predicates against them. Classification is
//! best-effort: a failed query degrades the fact, it never aborts the caller.
//!
//! # Modules
//!
//! - [`facts`]: `ClusterFacts` + the `FactQueries` that populate it
//! - [`predicate`]: pure predicates and the `PredicateRegistry`
//! - [`classifier`]: `ClusterClassifier::classify()` and the logging checks
//! - [`platform`]: single-query platform probes (edge, NMState, IPI, Windows)
//!
//! [`CommandRunner`]: crate::command::CommandRunner

pub mod classifier;
pub mod facts;
pub mod platform;
pub mod predicate;

pub use classifier::{check_aws_sts, check_azure_wif, ClusterClassifier};
pub use facts::{ClusterFacts, FactQueries};
pub use platform::{PlatformProbe, PlatformQueries};
pub use predicate::{
    is_aws_sts, is_azure_wif, is_gcp, is_gcp_wif, CapabilityPredicate, PredicateRegistry,
};
