use thiserror::Error;

/// Error taxonomy (spec §7). `TransientHost` and `AwaitingExternal` are
/// deliberately *not* variants here: the first is masked from upstream by
/// the Transient Error Arbiter before it would ever become an `Err`, and the
/// second is never an error at all — both are encoded as an `Ok(RequeueHint)`
/// instead. Only the genuinely terminal or non-retriable cases are errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed profile, selector, or firmware URL. Non-retriable; the
    /// caller surfaces this as a node condition with reason `InvalidInput`.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resource math failed at the Allocator's pre-check (§4.A). Surfaced on
    /// the NAR, never partially applied — the pre-check never mutates.
    #[error("insufficient capacity for node group '{group}': needed {needed}, found {available}")]
    InsufficientCapacity { group: String, needed: u32, available: u32 },

    /// A host stayed in `Error` beyond the Transient Error Arbiter's window,
    /// or reported a fatal error type (§4.E, §4.B Failure). Terminal: the
    /// caller clears in-progress markers and surfaces node Failed.
    #[error("persistent host error: {message}")]
    PersistentHost { message: String },

    #[error(transparent)]
    Store(#[from] bmh_store::StoreError),

    #[error(transparent)]
    Operator(#[from] bmh_operator::OperatorError),

    #[error(transparent)]
    Select(#[from] bmh_select::SelectError),

    #[error(transparent)]
    Config(#[from] bmh_config::ConfigError),

    #[error("internal reconciler error: {0}")]
    Internal(String),
}
