//! Wire-level label/annotation contract (spec §6). Every name here MUST
//! match the external bare-metal operator bit-for-bit; these are the only
//! strings that cross the process boundary as command/control state.

/// Set to `"true"` once the Allocator has reserved a host; also used by
/// §4.D's primary filter to exclude already-allocated hosts.
pub const ALLOCATED_LABEL: &str = "clcm.openshift.io/allocated";
/// Carries the deterministic `AllocatedNode` name once a host is reserved.
pub const ALLOCATED_NODE_LABEL: &str = "clcm.openshift.io/allocatedNode";
pub const SITE_ID_LABEL: &str = "clcm.openshift.io/siteId";
pub const RESOURCE_POOL_ID_LABEL: &str = "clcm.openshift.io/resourcePoolId";
/// Maps a logical interface label to a NIC name or hyphenated MAC address.
pub const INTERFACE_LABEL_PREFIX: &str = "interfacelabel.clcm.openshift.io/";

/// Presence permits the controller to reconfigure an already-provisioned host.
pub const ALLOW_HOST_MANAGEMENT_ANNOTATION: &str =
    "bmac.agent-install.openshift.io/allow-provisioned-host-management";
pub const BIOS_UPDATE_NEEDED_ANNOTATION: &str = "clcm.openshift.io/bios-update-needed";
pub const FIRMWARE_UPDATE_NEEDED_ANNOTATION: &str = "clcm.openshift.io/firmware-update-needed";
/// Presence requests a reboot; owned by the external operator's reboot flow.
pub const REBOOT_ANNOTATION: &str = "reboot.metal3.io";
/// RFC-3339 UTC timestamp stamped by the Transient Error Arbiter (§4.E).
pub const BMH_ERROR_TIMESTAMP_ANNOTATION: &str = "clcm.openshift.io/bmh-error-timestamp";
/// Presence on the host at delete time skips the Deallocation Finalizer's
/// wipe/clear steps beyond reservation state (§4.F scenario 6).
pub const SKIP_CLEANUP_ANNOTATION: &str = "clcm.openshift.io/skip-cleanup";
/// Set by the finalizer once deprovisioning has been confirmed complete.
pub const DEALLOCATION_COMPLETE_ANNOTATION: &str = "clcm.openshift.io/deallocation-complete";
/// Carries the active `config-in-progress` reason tag (§4.B/§6).
pub const CONFIG_IN_PROGRESS_ANNOTATION: &str = "clcm.openshift.io/config-in-progress";

/// Selector-map key prefix that becomes a direct label-equality requirement
/// in the primary filter (§4.D); the prefix is stripped to get the label key.
pub const RESOURCE_SELECTOR_PREFIX: &str = "resource-selector/";
/// Selector-map key prefix deferred to the hardware-data secondary filter.
pub const HARDWAREDATA_PREFIX: &str = "hardwaredata/";

// §4.F names these four conceptually ("infra-env label", "owned-by label",
// "custom-deploy annotation", "image reference annotation", "automated
// cleaning annotation") without giving their literal wire strings the way
// §6's table does for the others. Chosen consistent with the rest of this
// plugin's `clcm.openshift.io/…` namespace; see DESIGN.md.
pub const INFRA_ENV_LABEL: &str = "clcm.openshift.io/infraEnv";
pub const OWNED_BY_LABEL: &str = "clcm.openshift.io/owned-by";
pub const CUSTOM_DEPLOY_ANNOTATION: &str = "clcm.openshift.io/custom-deploy";
pub const IMAGE_REFERENCE_ANNOTATION: &str = "clcm.openshift.io/image-reference";
pub const AUTOMATED_CLEANING_MODE_ANNOTATION: &str = "clcm.openshift.io/automated-cleaning-mode";

/// The one logical interface label the Allocator checks for an explicit boot
/// NIC (§4.A step 6); other logical names under [`INTERFACE_LABEL_PREFIX`]
/// are the external operator's concern, not this plugin's.
pub const BOOT_INTERFACE_LABEL_KEY: &str = "interfacelabel.clcm.openshift.io/boot";
/// Not part of §6's table (the domain model has no `spec.bootMACAddress`
/// field of its own); modeled as a host annotation for consistency with
/// every other command-channel write this plugin makes.
pub const BOOT_MAC_ANNOTATION: &str = "clcm.openshift.io/bootMACAddress";
