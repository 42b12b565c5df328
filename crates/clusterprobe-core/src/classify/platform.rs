//! Single-query platform probes.
//!
//! Each probe issues one read-only command and decides from its stdout.
//! Like `classify`, a failed query simply yields `false`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{run_best_effort, CommandRunner};

use super::classifier::ClusterClassifier;

/// Platforms where the NMState operator is supported.
const NMSTATE_PLATFORMS: &[&str] = &["BareMetal", "None", "VSphere", "OpenStack"];

/// Command lines behind the platform probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformQueries {
    /// Prints `.spec.platformSpec.type` of the infrastructure resource.
    pub platform_type: String,
    /// Lists Machine API machines.
    pub machines: String,
    /// Lists nodes labelled `kubernetes.io/os=windows`.
    pub windows_nodes: String,
}

impl Default for PlatformQueries {
    fn default() -> Self {
        Self::for_cli("oc")
    }
}

impl PlatformQueries {
    pub fn for_cli(cli: &str) -> Self {
        Self {
            platform_type: format!(
                "{cli} get infrastructure cluster -o jsonpath={{.spec.platformSpec.type}}"
            ),
            machines: format!("{cli} get machines.machine.openshift.io -n openshift-machine-api"),
            windows_nodes: format!("{cli} get node -l kubernetes.io/os=windows"),
        }
    }
}

/// The probes exposed by [`ClusterClassifier::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformProbe {
    /// Bare-metal (edge) installation.
    Edge,
    /// Platform supported by the NMState operator.
    NmState,
    /// Installer-provisioned infrastructure with running machines.
    Ipi,
    /// At least one Windows worker node.
    WindowsNode,
}

impl std::fmt::Display for PlatformProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformProbe::Edge => write!(f, "edge"),
            PlatformProbe::NmState => write!(f, "nmstate"),
            PlatformProbe::Ipi => write!(f, "ipi"),
            PlatformProbe::WindowsNode => write!(f, "windows_node"),
        }
    }
}

/// Bare-metal platform type.
pub fn is_edge_platform(platform_type: &str) -> bool {
    platform_type.trim() == "BareMetal"
}

pub fn is_nmstate_platform(platform_type: &str) -> bool {
    NMSTATE_PLATFORMS.contains(&platform_type.trim())
}

/// A machine listing containing at least one `Running` machine.
pub fn has_running_machines(machine_list: &str) -> bool {
    machine_list.contains("Running")
}

/// Any non-blank output from the Windows node query.
pub fn has_windows_nodes(node_list: &str) -> bool {
    !node_list.trim().is_empty()
}

impl<R: CommandRunner> ClusterClassifier<R> {
    /// Run one platform probe against the cluster.
    pub async fn probe(&self, probe: PlatformProbe) -> bool {
        let (query, check, yes, no) = match probe {
            PlatformProbe::Edge => (
                self.platform_queries.platform_type.as_str(),
                is_edge_platform as fn(&str) -> bool,
                "Testing on Edge cluster.",
                "It's not Edge cluster. Skip!",
            ),
            PlatformProbe::NmState => (
                self.platform_queries.platform_type.as_str(),
                is_nmstate_platform as fn(&str) -> bool,
                "Testing on baremetal/vsphere/openstack.",
                "Skipping for unsupported platform, not baremetal/vsphere/openstack!",
            ),
            PlatformProbe::Ipi => (
                self.platform_queries.machines.as_str(),
                has_running_machines as fn(&str) -> bool,
                "Testing on IPI cluster!",
                "Not IPI cluster. Skip!",
            ),
            PlatformProbe::WindowsNode => (
                self.platform_queries.windows_nodes.as_str(),
                has_windows_nodes as fn(&str) -> bool,
                "Testing on cluster with windows node.",
                "Testing on cluster without windows node. Skip this windows scenario!",
            ),
        };

        let result = run_best_effort(&self.runner, query, self.command_timeout_ms).await;
        let matched = check(&result.stdout);
        info!(
            event = "probe.evaluated",
            probe = %probe,
            matched = matched,
            "{}",
            if matched { yes } else { no }
        );
        matched
    }

    pub async fn is_edge_cluster(&self) -> bool {
        self.probe(PlatformProbe::Edge).await
    }

    pub async fn is_platform_suitable_for_nmstate(&self) -> bool {
        self.probe(PlatformProbe::NmState).await
    }

    pub async fn is_ipi_cluster(&self) -> bool {
        self.probe(PlatformProbe::Ipi).await
    }

    pub async fn has_windows_node(&self) -> bool {
        self.probe(PlatformProbe::WindowsNode).await
    }
}
