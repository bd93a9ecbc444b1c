use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bmh_domain::{AllocatedNodeId, NarId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::state::{AllocatedNodeRecord, AuditEvent, NarRecord};
use crate::store::ObjectStore;

#[derive(Debug, Default)]
struct Inner {
    nars: HashMap<NarId, NarRecord>,
    nodes: HashMap<AllocatedNodeId, AllocatedNodeRecord>,
    events: Vec<AuditEvent>,
}

/// In-memory [`ObjectStore`]. All data is lost on process exit; suitable for
/// tests and for running the controller against a local operator fixture.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_nar(&self, id: &NarId) -> Result<Option<NarRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.nars.get(id).cloned())
    }

    async fn list_nars(&self) -> Result<Vec<NarRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.nars.values().cloned().collect())
    }

    async fn upsert_nar(&self, record: &NarRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.nars.insert(record.nar.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_nar(&self, id: &NarId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.nars.remove(id);
        Ok(())
    }

    async fn get_allocated_node(&self, id: &AllocatedNodeId) -> Result<Option<AllocatedNodeRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.nodes.get(id).cloned())
    }

    async fn list_allocated_nodes(&self, nar_id: &NarId) -> Result<Vec<AllocatedNodeRecord>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .nodes
            .values()
            .filter(|r| &r.node.spec.nar_id == nar_id)
            .cloned()
            .collect())
    }

    async fn upsert_allocated_node(&self, record: &AllocatedNodeRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.nodes.insert(record.node.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_allocated_node(&self, id: &AllocatedNodeId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.nodes.remove(id);
        Ok(())
    }

    async fn append_event(&self, event: &AuditEvent) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, nar_id: Option<&NarId>, limit: u32) -> Result<Vec<AuditEvent>, StoreError> {
        let guard = self.inner.read().await;
        let filtered: Vec<AuditEvent> = guard
            .events
            .iter()
            .filter(|ev| nar_id.map_or(true, |id| ev.nar_id().map_or(false, |e| e == id)))
            .cloned()
            .collect();
        let start = filtered.len().saturating_sub(limit as usize);
        Ok(filtered[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::{NarSpec, NarStatus, NodeAllocationRequest};
    use chrono::Utc;

    fn dummy_nar(id: &str) -> NarRecord {
        let nar = NodeAllocationRequest {
            id: NarId::new(id),
            generation: 1,
            spec: NarSpec { cluster_id: "cluster-a".into(), site_id: Some("site-1".into()), node_groups: vec![] },
            status: NarStatus::default(),
        };
        NarRecord::new(nar, Utc::now())
    }

    #[tokio::test]
    async fn upsert_and_get() {
        let store = InMemoryStore::new();
        store.upsert_nar(&dummy_nar("nar-1")).await.unwrap();
        let got = store.get_nar(&NarId::new("nar-1")).await.unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn list_nars_returns_all() {
        let store = InMemoryStore::new();
        store.upsert_nar(&dummy_nar("a")).await.unwrap();
        store.upsert_nar(&dummy_nar("b")).await.unwrap();
        assert_eq!(store.list_nars().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_nar_removes_it() {
        let store = InMemoryStore::new();
        store.upsert_nar(&dummy_nar("del")).await.unwrap();
        store.delete_nar(&NarId::new("del")).await.unwrap();
        assert!(store.get_nar(&NarId::new("del")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn events_filtered_by_nar() {
        use uuid::Uuid;

        let store = InMemoryStore::new();
        store
            .append_event(&AuditEvent::NarReconcileStarted { id: Uuid::new_v4(), at: Utc::now(), nar_id: NarId::new("a") })
            .await
            .unwrap();
        store
            .append_event(&AuditEvent::NarReconcileStarted { id: Uuid::new_v4(), at: Utc::now(), nar_id: NarId::new("b") })
            .await
            .unwrap();

        assert_eq!(store.list_events(None, 100).await.unwrap().len(), 2);
        assert_eq!(store.list_events(Some(&NarId::new("a")), 100).await.unwrap().len(), 1);
    }
}
