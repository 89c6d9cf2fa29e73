use thiserror::Error;

#[derive(Error, Debug)]
pub enum PedigraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Pedigree source error: {0}")]
    Source(String),

    #[error("Builder error: {0}")]
    Builder(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid registry id: {0}")]
    InvalidId(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, PedigraphError>;
