use async_trait::async_trait;
use bmh_domain::{AllocatedNodeId, NarId};
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::state::{AllocatedNodeRecord, AuditEvent, NarRecord};
use crate::store::ObjectStore;

const NARS: TableDefinition<&str, &[u8]> = TableDefinition::new("nars");
const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("allocated_nodes");
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");

fn redb_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb(e.to_string())
}

/// Embedded, single-instance [`ObjectStore`] backed by `redb`. Durable across
/// process restarts; not suitable for multiple controller replicas sharing
/// one database file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(redb_err)?;
        let write_txn = db.begin_write().map_err(redb_err)?;
        {
            write_txn.open_table(NARS).map_err(redb_err)?;
            write_txn.open_table(NODES).map_err(redb_err)?;
            write_txn.open_table(EVENTS).map_err(redb_err)?;
        }
        write_txn.commit().map_err(redb_err)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl ObjectStore for RedbStore {
    async fn get_nar(&self, id: &NarId) -> Result<Option<NarRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(NARS).map_err(redb_err)?;
        match table.get(id.as_str()).map_err(redb_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    async fn list_nars(&self) -> Result<Vec<NarRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(NARS).map_err(redb_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(redb_err)? {
            let (_, v) = entry.map_err(redb_err)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    async fn upsert_nar(&self, record: &NarRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(NARS).map_err(redb_err)?;
            table.insert(record.nar.id.as_str(), bytes.as_slice()).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }

    async fn delete_nar(&self, id: &NarId) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(NARS).map_err(redb_err)?;
            table.remove(id.as_str()).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }

    async fn get_allocated_node(&self, id: &AllocatedNodeId) -> Result<Option<AllocatedNodeRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(NODES).map_err(redb_err)?;
        match table.get(id.as_str()).map_err(redb_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    async fn list_allocated_nodes(&self, nar_id: &NarId) -> Result<Vec<AllocatedNodeRecord>, StoreError> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(NODES).map_err(redb_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(redb_err)? {
            let (_, v) = entry.map_err(redb_err)?;
            let record: AllocatedNodeRecord = serde_json::from_slice(v.value())?;
            if &record.node.spec.nar_id == nar_id {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn upsert_allocated_node(&self, record: &AllocatedNodeRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(NODES).map_err(redb_err)?;
            table.insert(record.node.id.as_str(), bytes.as_slice()).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }

    async fn delete_allocated_node(&self, id: &AllocatedNodeId) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(NODES).map_err(redb_err)?;
            table.remove(id.as_str()).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }

    async fn append_event(&self, event: &AuditEvent) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(event)?;
        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(EVENTS).map_err(redb_err)?;
            let next_key = match table.iter().map_err(redb_err)?.next_back() {
                Some(entry) => entry.map_err(redb_err)?.0.value() + 1,
                None => 0u64,
            };
            table.insert(next_key, bytes.as_slice()).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }

    async fn list_events(&self, nar_id: Option<&NarId>, limit: u32) -> Result<Vec<AuditEvent>, StoreError> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(EVENTS).map_err(redb_err)?;
        let mut all = Vec::new();
        for entry in table.iter().map_err(redb_err)? {
            let (_, v) = entry.map_err(redb_err)?;
            let event: AuditEvent = serde_json::from_slice(v.value())?;
            if nar_id.map_or(true, |id| event.nar_id().map_or(false, |e| e == id)) {
                all.push(event);
            }
        }
        let start = all.len().saturating_sub(limit as usize);
        Ok(all[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::{NarSpec, NarStatus, NodeAllocationRequest};
    use chrono::Utc;
    use tempfile::TempDir;

    fn dummy_nar(id: &str) -> NarRecord {
        let nar = NodeAllocationRequest {
            id: NarId::new(id),
            generation: 1,
            spec: NarSpec { cluster_id: "cluster-a".into(), site_id: None, node_groups: vec![] },
            status: NarStatus::default(),
        };
        NarRecord::new(nar, Utc::now())
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            store.upsert_nar(&dummy_nar("nar-1")).await.unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        let got = store.get_nar(&NarId::new("nar-1")).await.unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("store.redb")).unwrap();
        store.upsert_nar(&dummy_nar("del")).await.unwrap();
        store.delete_nar(&NarId::new("del")).await.unwrap();
        assert!(store.get_nar(&NarId::new("del")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn events_append_and_list_in_order() {
        use uuid::Uuid;

        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("store.redb")).unwrap();
        for i in 0..3 {
            store
                .append_event(&AuditEvent::NarReconcileStarted {
                    id: Uuid::new_v4(),
                    at: Utc::now(),
                    nar_id: NarId::new(format!("nar-{i}")),
                })
                .await
                .unwrap();
        }
        let events = store.list_events(None, 100).await.unwrap();
        assert_eq!(events.len(), 3);
    }
}
