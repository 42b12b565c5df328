//! clusterprobe core library
//!
//! Polling and classification primitives for end-to-end suites that drive a
//! cluster through its CLI:
//!
//! - [`command`]: `CommandRunner` trait, `ShellCommandRunner`, `AdminCli`
//! - [`poll`]: `RetryPoller`, re-running a command until stdout shows a marker
//! - [`classify`]: `ClusterClassifier`, named capability predicates over
//!   freshly read cluster facts, plus single-query platform probes
//! - [`restore`]: `RestoreContext`, explicit fixture setup/teardown state
//! - [`config`]: `ProbeConfig` from environment variables

pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod poll;
pub mod restore;
pub mod telemetry;

pub use classify::{
    check_aws_sts, check_azure_wif, is_aws_sts, is_azure_wif, is_gcp, is_gcp_wif,
    CapabilityPredicate, ClusterClassifier, ClusterFacts, FactQueries, PlatformProbe,
    PlatformQueries, PredicateRegistry,
};
pub use command::{AdminCli, CommandOptions, CommandResult, CommandRunner, ShellCommandRunner};
pub use config::ProbeConfig;
pub use error::{ProbeError, ProbeResult};
pub use poll::{RetryOptions, RetryOutcome, RetryPoller};
pub use restore::{ResourceRef, ResourceSnapshot, RestoreAction, RestoreContext, RestoreStep};
pub use telemetry::init_tracing;
