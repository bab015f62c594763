use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown job name: {0} (expected: ps|worker)")]
    UnknownJobName(String),
    #[error("job '{0}' declared more than once")]
    DuplicateJob(String),
    #[error("job '{job}' is invalid: {reason}")]
    InvalidJob { job: String, reason: String },
}
