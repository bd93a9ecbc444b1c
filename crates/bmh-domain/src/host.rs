use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::HostRef;

/// Provisioning state of the external host lifecycle (spec §3). Open-ended:
/// the external operator may report states this core doesn't special-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Available,
    Preparing,
    Provisioning,
    Provisioned,
    Deprovisioning,
    Inspecting,
    Other(String),
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningState::Available => write!(f, "Available"),
            ProvisioningState::Preparing => write!(f, "Preparing"),
            ProvisioningState::Provisioning => write!(f, "Provisioning"),
            ProvisioningState::Provisioned => write!(f, "Provisioned"),
            ProvisioningState::Deprovisioning => write!(f, "Deprovisioning"),
            ProvisioningState::Inspecting => write!(f, "Inspecting"),
            ProvisioningState::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
    Servicing,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicInfo {
    pub name: String,
    pub mac_address: String,
    pub model: String,
    pub vendor: String,
    pub speed_gbps: Option<u32>,
    #[serde(default)]
    pub alternate_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub name: String,
    pub model: String,
    pub vendor: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareDetails {
    pub cpu_arch: String,
    pub cpu_model: String,
    pub manufacturer: String,
    pub product_name: String,
    pub serial_number: String,
    pub num_threads: u32,
    pub ram_mebibytes: u64,
    /// Empty when the bare-metal operator hasn't reported one yet.
    #[serde(default)]
    pub bmc_address: String,
    pub nics: Vec<NicInfo>,
    pub storage: Vec<StorageInfo>,
}

/// External record owned by the bare-metal operator (spec §3). This core
/// only ever reads the observed fields and writes the label/annotation
/// command channel (§6) — it never drives IPMI/Redfish itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BareMetalHost {
    pub host_ref: HostRef,
    pub provisioning_state: ProvisioningState,
    pub operational_status: OperationalStatus,
    pub error_type: Option<String>,
    pub hardware: Option<HardwareDetails>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub online: bool,
}

impl BareMetalHost {
    pub fn is_allocated(&self) -> bool {
        self.labels.get("clcm.openshift.io/allocated").map(|v| v == "true").unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareComponentStatus {
    pub component: String,
    pub current_version: String,
}

/// Observation record produced by the bare-metal operator (spec §3/§6).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFirmwareComponents {
    pub generation: u64,
    pub components: Vec<FirmwareComponentStatus>,
    pub change_detected: bool,
    pub valid: bool,
    pub observed_generation: u64,
}

impl HostFirmwareComponents {
    /// "change-detected-and-valid" verdict (§4.B reboot gating).
    pub fn change_detected_and_valid(&self) -> bool {
        self.change_detected && self.valid && self.observed_generation == self.generation
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFirmwareSettings {
    pub generation: u64,
    pub settings: HashMap<String, String>,
    pub change_detected: bool,
    pub valid: bool,
    pub observed_generation: u64,
}

impl HostFirmwareSettings {
    pub fn change_detected_and_valid(&self) -> bool {
        self.change_detected && self.valid && self.observed_generation == self.generation
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprovisioningImage {
    pub network_data_name: String,
    pub network_data_version: String,
    /// Mirrors the image-side half of the infra-env label pair (§4.F step 1);
    /// the bare-metal operator keeps its own copy on the host record.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl PreprovisioningImage {
    pub fn network_data_is_cleared(&self) -> bool {
        self.network_data_name.is_empty() && self.network_data_version.is_empty()
    }
}

/// Requested by the Firmware Engine when a post-install host needs updates
/// (§4.B "Programming"). The external operator owns actually applying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUpdatePolicy {
    pub allow_firmware_updates: bool,
    pub allow_bios_settings_updates: bool,
}
