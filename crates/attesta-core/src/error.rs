/// Errors surfaced by record store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation failed: {0}")]
    Operation(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("corrupt record for {id}: {detail}")]
    Corrupt { id: String, detail: String },
}
