use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::ids::NarId;

/// One group of like hosts within a NAR (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    /// Role tag, e.g. "master"/"worker". Compared case-insensitively
    /// everywhere the rolling scheduler orders by role (§4.C).
    pub role: String,
    pub size: u32,
    pub hardware_profile_ref: String,
    pub resource_pool_id: Option<String>,
    #[serde(default)]
    pub selector: HashMap<String, String>,
}

impl NodeGroup {
    pub fn is_master(&self) -> bool {
        self.role.eq_ignore_ascii_case("master")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarSpec {
    pub cluster_id: String,
    pub site_id: Option<String>,
    pub node_groups: Vec<NodeGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarStatus {
    pub node_names: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl NarStatus {
    /// Append a node name, skipping if already recorded — this is the
    /// "append before any gating wait" step of Allocator reservation (§4.A
    /// step 8), and must itself be idempotent across retries.
    pub fn record_node(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.node_names.iter().any(|n| n == &name) {
            self.node_names.push(name);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAllocationRequest {
    pub id: NarId,
    pub generation: u64,
    pub spec: NarSpec,
    #[serde(default)]
    pub status: NarStatus,
}

impl NodeAllocationRequest {
    pub fn new(id: impl Into<NarId>, spec: NarSpec) -> Self {
        Self { id: id.into(), generation: 1, spec, status: NarStatus::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_match_is_case_insensitive() {
        let g = NodeGroup {
            name: "m".into(),
            role: "Master".into(),
            size: 1,
            hardware_profile_ref: "p".into(),
            resource_pool_id: None,
            selector: HashMap::new(),
        };
        assert!(g.is_master());
    }

    #[test]
    fn record_node_is_idempotent() {
        let mut status = NarStatus::default();
        status.record_node("a");
        status.record_node("a");
        assert_eq!(status.node_names, vec!["a".to_string()]);
    }
}
