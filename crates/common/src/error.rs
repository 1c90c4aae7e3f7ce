use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed strategy config, rejected before any state mutation.
    #[error("invalid strategy config: {0}")]
    Validation(String),

    #[error("strategy '{0}' not found")]
    NotFound(String),

    #[error("strategy '{0}' already exists")]
    AlreadyExists(String),

    /// Failure during indicator update or signal evaluation.
    #[error("processing error: {0}")]
    Processing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
