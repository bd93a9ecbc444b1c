pub mod condition;
pub mod error;
pub mod host;
pub mod ids;
pub mod keys;
pub mod nar;
pub mod node;
pub mod profile;
pub mod requeue;

pub use condition::{find_condition, set_condition, Condition, ConditionReason, ConditionStatus, ConditionType};
pub use error::DomainError;
pub use host::{
    BareMetalHost, FirmwareComponentStatus, HardwareDetails, HostFirmwareComponents,
    HostFirmwareSettings, HostUpdatePolicy, NicInfo, OperationalStatus, PreprovisioningImage,
    ProvisioningState, StorageInfo,
};
pub use ids::{allocated_node_name, AllocatedNodeId, HostRef, NarId, NodeGroupName};
pub use nar::{NarSpec, NarStatus, NodeAllocationRequest, NodeGroup};
pub use node::{
    AllocatedNode, AllocatedNodeSpec, AllocatedNodeStatus, ConfigInProgressReason, NodeInterface,
};
pub use profile::{FirmwareEntry, HardwareProfile};
pub use requeue::RequeueHint;
