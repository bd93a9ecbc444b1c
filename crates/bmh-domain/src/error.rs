use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid firmware entry: version set without a well-formed url ({0})")]
    InvalidFirmwareEntry(String),

    #[error("node group '{0}' has zero-length selector key")]
    EmptySelectorKey(String),

    #[error("node group '{0}' has size 0 but is referenced as required")]
    ZeroSizeNodeGroup(String),

    #[error("invalid host reference: {0}")]
    InvalidHostRef(String),
}
