use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node allocation request not found: {0}")]
    NarNotFound(String),

    #[error("allocated node not found: {0}")]
    AllocatedNodeNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),

    #[error("redb error: {0}")]
    Redb(String),
}
