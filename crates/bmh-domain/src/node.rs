use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::ids::{AllocatedNodeId, HostRef, NarId};

/// Values the `config-in-progress` annotation carries (spec §4.B/§6).
/// At most one is set at a time — enforced by the reconciler, not this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigInProgressReason {
    BiosSettingsUpdate,
    FirmwareUpdate,
}

impl std::fmt::Display for ConfigInProgressReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigInProgressReason::BiosSettingsUpdate => write!(f, "bios-settings-update"),
            ConfigInProgressReason::FirmwareUpdate => write!(f, "firmware-update"),
        }
    }
}

impl ConfigInProgressReason {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bios-settings-update" => Some(Self::BiosSettingsUpdate),
            "firmware-update" => Some(Self::FirmwareUpdate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInterface {
    pub name: String,
    pub mac_address: String,
    pub ipv4_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedNodeSpec {
    pub nar_id: NarId,
    pub node_group_name: String,
    pub host: HostRef,
    pub hw_profile_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedNodeStatus {
    pub bmc_address: Option<String>,
    pub interfaces: Vec<NodeInterface>,
    pub applied_profile: Option<String>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedNode {
    pub id: AllocatedNodeId,
    pub spec: AllocatedNodeSpec,
    #[serde(default)]
    pub status: AllocatedNodeStatus,
    /// Mirrors the `config-in-progress` annotation on the host. Kept here as
    /// well so the rolling scheduler's in-progress drain (§4.C step 1) can
    /// find the one in-flight node without re-reading the host.
    pub config_in_progress: Option<ConfigInProgressReason>,
    /// Blocks deletion until the Deallocation Finalizer (§4.F) completes.
    pub has_ownership_finalizer: bool,
}

impl AllocatedNode {
    pub fn new(id: AllocatedNodeId, spec: AllocatedNodeSpec) -> Self {
        Self {
            id,
            spec,
            status: AllocatedNodeStatus::default(),
            config_in_progress: None,
            has_ownership_finalizer: true,
        }
    }
}
