use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("a node with role={role:?} type={node_type:?} already exists (invariant I1)")]
    DuplicateRolePair { role: String, node_type: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
