use serde::{Deserialize, Serialize};

/// Which map on the host a [`PatchOp`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchTarget {
    Label,
    Annotation,
}

/// One command-channel write (spec §9: the original's type-switch on
/// metaType/op collapses to this single tagged variant). `apply_patch`
/// applies a batch atomically under one optimistic-concurrency retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchOp {
    Add { target: PatchTarget, key: String, value: String },
    Remove { target: PatchTarget, key: String },
}

impl PatchOp {
    pub fn add_label(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Add { target: PatchTarget::Label, key: key.into(), value: value.into() }
    }

    pub fn add_annotation(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Add { target: PatchTarget::Annotation, key: key.into(), value: value.into() }
    }

    pub fn remove_label(key: impl Into<String>) -> Self {
        Self::Remove { target: PatchTarget::Label, key: key.into() }
    }

    pub fn remove_annotation(key: impl Into<String>) -> Self {
        Self::Remove { target: PatchTarget::Annotation, key: key.into() }
    }

    /// Apply this op to an in-memory label/annotation map. Set-if-absent and
    /// delete-if-present are no-ops (spec §3 idempotent-labels invariant) —
    /// returns whether the map actually changed.
    pub fn apply(&self, labels: &mut std::collections::HashMap<String, String>, annotations: &mut std::collections::HashMap<String, String>) -> bool {
        match self {
            PatchOp::Add { target, key, value } => {
                let map = match target {
                    PatchTarget::Label => &mut *labels,
                    PatchTarget::Annotation => &mut *annotations,
                };
                if map.get(key).map(String::as_str) == Some(value.as_str()) {
                    false
                } else {
                    map.insert(key.clone(), value.clone());
                    true
                }
            }
            PatchOp::Remove { target, key } => {
                let map = match target {
                    PatchTarget::Label => &mut *labels,
                    PatchTarget::Annotation => &mut *annotations,
                };
                map.remove(key).is_some()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn add_is_noop_when_already_present_with_same_value() {
        let mut labels = HashMap::from([("k".to_string(), "v".to_string())]);
        let mut annotations = HashMap::new();
        let changed = PatchOp::add_label("k", "v").apply(&mut labels, &mut annotations);
        assert!(!changed);
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let mut labels = HashMap::new();
        let mut annotations = HashMap::new();
        let changed = PatchOp::remove_label("k").apply(&mut labels, &mut annotations);
        assert!(!changed);
    }

    #[test]
    fn add_overwrites_differing_value() {
        let mut labels = HashMap::from([("k".to_string(), "old".to_string())]);
        let mut annotations = HashMap::new();
        let changed = PatchOp::add_label("k", "new").apply(&mut labels, &mut annotations);
        assert!(changed);
        assert_eq!(labels.get("k").map(String::as_str), Some("new"));
    }
}
