use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("invalid selector key '{key}': {reason}")]
    InvalidSelector { key: String, reason: String },
}
