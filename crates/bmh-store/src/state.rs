use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use bmh_domain::{AllocatedNode, AllocatedNodeId, ConfigInProgressReason, NarId, NodeAllocationRequest};

// ── Store-level bookkeeping ──────────────────────────────────────────────────

/// Bookkeeping the store attaches to a record on top of the domain type's own
/// status/conditions. Kept separate from [`bmh_domain`] so the reconciler's
/// view of an object never depends on storage internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMeta {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// SHA-256 of the canonical JSON of the object's spec at last write.
    /// Lets a reconciler short-circuit when nothing has actually changed.
    pub desired_hash: Option<String>,
}

impl StoredMeta {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { created_at: now, updated_at: now, desired_hash: None }
    }

    pub fn touch(&mut self, now: DateTime<Utc>, hash: String) {
        self.updated_at = now;
        self.desired_hash = Some(hash);
    }
}

/// Serialize `value` to canonical JSON (object keys sorted) and return its
/// SHA-256 hex digest.
pub fn compute_desired_hash<T: Serialize>(value: &T) -> String {
    let v = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    let canonical = sort_json_keys(v);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

fn sort_json_keys(v: serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> =
                map.into_iter().map(|(k, v)| (k, sort_json_keys(v))).collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(sort_json_keys).collect()),
        other => other,
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarRecord {
    pub nar: NodeAllocationRequest,
    pub meta: StoredMeta,
}

impl NarRecord {
    pub fn new(nar: NodeAllocationRequest, now: DateTime<Utc>) -> Self {
        Self { nar, meta: StoredMeta::new(now) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatedNodeRecord {
    pub node: AllocatedNode,
    pub meta: StoredMeta,
}

impl AllocatedNodeRecord {
    pub fn new(node: AllocatedNode, now: DateTime<Utc>) -> Self {
        Self { node, meta: StoredMeta::new(now) }
    }
}

// ── AuditEvent ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AuditEvent {
    NarReconcileStarted {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
    },
    NarReconcileCompleted {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
        changes: usize,
    },
    NarError {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
        message: String,
    },
    NodeAllocated {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
        node_id: AllocatedNodeId,
    },
    NodeConfigInProgress {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
        node_id: AllocatedNodeId,
        reason: ConfigInProgressReason,
    },
    NodeError {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
        node_id: AllocatedNodeId,
        message: String,
    },
    NodeDeallocated {
        id: Uuid,
        at: DateTime<Utc>,
        nar_id: NarId,
        node_id: AllocatedNodeId,
    },
}

impl AuditEvent {
    pub fn nar_id(&self) -> Option<&NarId> {
        match self {
            AuditEvent::NarReconcileStarted { nar_id, .. } => Some(nar_id),
            AuditEvent::NarReconcileCompleted { nar_id, .. } => Some(nar_id),
            AuditEvent::NarError { nar_id, .. } => Some(nar_id),
            AuditEvent::NodeAllocated { nar_id, .. } => Some(nar_id),
            AuditEvent::NodeConfigInProgress { nar_id, .. } => Some(nar_id),
            AuditEvent::NodeError { nar_id, .. } => Some(nar_id),
            AuditEvent::NodeDeallocated { nar_id, .. } => Some(nar_id),
        }
    }
}
