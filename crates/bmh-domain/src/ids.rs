use serde::{Deserialize, Serialize};

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::new(s)
            }
        }
    };
}

newtype_id!(NarId);
newtype_id!(AllocatedNodeId);
newtype_id!(NodeGroupName);

/// Identifies one BareMetalHost record owned by the external bare-metal operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostRef {
    pub namespace: String,
    pub name: String,
}

impl HostRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl std::fmt::Display for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Deterministic `AllocatedNode` name: plugin id, cluster id, host namespace, host name.
///
/// Idempotent by construction — calling the Allocator twice for the same
/// NAR/host pair always yields the same name, which is what makes step 2 of
/// the per-host reservation sequence ("create if absent") safe to retry.
pub fn allocated_node_name(plugin_id: &str, cluster_id: &str, host: &HostRef) -> AllocatedNodeId {
    AllocatedNodeId::new(format!(
        "{plugin_id}-{cluster_id}-{}-{}",
        host.namespace, host.name
    ))
}
