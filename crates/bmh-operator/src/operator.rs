use async_trait::async_trait;
use bmh_domain::{BareMetalHost, HostFirmwareComponents, HostFirmwareSettings, HostRef, HostUpdatePolicy, PreprovisioningImage};

use crate::error::OperatorError;
use crate::patch::PatchOp;

/// The controller's only channel to the external bare-metal operator
/// (component G, §2): read its observation records and write its
/// label/annotation command channel (§6). This core never drives IPMI/
/// Redfish directly — that remains the bare-metal operator's job.
#[async_trait]
pub trait HostOperator: Send + Sync + 'static {
    async fn get_host(&self, host_ref: &HostRef) -> Result<Option<BareMetalHost>, OperatorError>;

    /// Unallocated hosts, for the Allocator's candidate search (§4.A
    /// pre-check / allocation loop). Filtering against the NAR's primary
    /// and secondary predicates is the caller's job (`bmh_select`); this
    /// only has to return hosts that could plausibly be considered.
    async fn list_available_hosts(&self) -> Result<Vec<BareMetalHost>, OperatorError>;

    /// Apply a batch of label/annotation writes under optimistic
    /// concurrency: read latest, mutate in memory, write a merge patch,
    /// retry up to `max_retries` times on conflict (§5). Idempotent per
    /// `PatchOp::apply`'s set-if-absent/delete-if-present semantics.
    async fn apply_patch(&self, host_ref: &HostRef, ops: &[PatchOp], max_retries: u32) -> Result<(), OperatorError>;

    /// Patch the host's `spec.online` field directly (§4.F step 4 — not
    /// part of the label/annotation command channel).
    async fn set_online(&self, host_ref: &HostRef, online: bool) -> Result<(), OperatorError>;

    async fn get_firmware_components(&self, host_ref: &HostRef) -> Result<Option<HostFirmwareComponents>, OperatorError>;

    /// Obtain the HostFirmwareComponents record, creating an empty one if
    /// none exists yet (§4.B Decision: "obtain or create ... if newly
    /// created assume required"). Returns `(record, newly_created)`.
    async fn get_or_create_firmware_components(&self, host_ref: &HostRef) -> Result<(HostFirmwareComponents, bool), OperatorError>;

    async fn get_firmware_settings(&self, host_ref: &HostRef) -> Result<Option<HostFirmwareSettings>, OperatorError>;

    async fn get_preprovisioning_image(&self, host_ref: &HostRef) -> Result<Option<PreprovisioningImage>, OperatorError>;

    /// Clear the host's preprovisioning network data (§4.A step 9, §4.B
    /// completion).
    async fn clear_preprovisioning_network_data(&self, host_ref: &HostRef) -> Result<(), OperatorError>;

    /// Remove a label from the host's preprovisioning image record (§4.F
    /// step 1 — the infra-env label lives on both the host and its image).
    /// No-op if the label is already absent or no image record exists yet.
    async fn remove_image_label(&self, host_ref: &HostRef, key: &str) -> Result<(), OperatorError>;

    /// Create or update the HostUpdatePolicy permitting firmware/BIOS
    /// updates (§4.B Programming).
    async fn set_update_policy(&self, host_ref: &HostRef, policy: HostUpdatePolicy) -> Result<(), OperatorError>;
}
