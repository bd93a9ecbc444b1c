use async_trait::async_trait;
use bmh_domain::{AllocatedNodeId, NarId};

use crate::error::StoreError;
use crate::state::{AllocatedNodeRecord, AuditEvent, NarRecord};

/// Persistence for the controller's own objects: node allocation requests and
/// the allocated nodes they produce. This is distinct from the external
/// bare-metal operator's BareMetalHost/HFC/HFS objects, which the controller
/// only ever reads and patches through `bmh_operator::HostOperator` — it never
/// owns their storage.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn get_nar(&self, id: &NarId) -> Result<Option<NarRecord>, StoreError>;
    async fn list_nars(&self) -> Result<Vec<NarRecord>, StoreError>;
    async fn upsert_nar(&self, record: &NarRecord) -> Result<(), StoreError>;
    async fn delete_nar(&self, id: &NarId) -> Result<(), StoreError>;

    async fn get_allocated_node(&self, id: &AllocatedNodeId) -> Result<Option<AllocatedNodeRecord>, StoreError>;
    async fn list_allocated_nodes(&self, nar_id: &NarId) -> Result<Vec<AllocatedNodeRecord>, StoreError>;
    async fn upsert_allocated_node(&self, record: &AllocatedNodeRecord) -> Result<(), StoreError>;
    async fn delete_allocated_node(&self, id: &AllocatedNodeId) -> Result<(), StoreError>;

    async fn append_event(&self, event: &AuditEvent) -> Result<(), StoreError>;

    async fn list_events(&self, nar_id: Option<&NarId>, limit: u32) -> Result<Vec<AuditEvent>, StoreError>;
}
