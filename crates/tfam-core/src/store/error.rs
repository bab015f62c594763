use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{op} '{key}' failed: {message}")]
    Operation {
        op: &'static str,
        key: String,
        message: String,
    },
    #[error("key '{0}' vanished before it could be read")]
    Missing(String),
    #[error("key '{key}' holds invalid data: {message}")]
    InvalidData { key: String, message: String },
}
