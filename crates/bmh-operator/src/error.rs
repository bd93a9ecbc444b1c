use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("label/annotation conflict retries exhausted for host {host}")]
    ConflictRetriesExhausted { host: String },

    #[error("request to bare-metal operator failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("internal operator client error: {0}")]
    Internal(String),
}
