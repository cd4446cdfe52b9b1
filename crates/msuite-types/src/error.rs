use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("insecure identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("metadata parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("metadata record has no object entry with an identifier")]
    MissingObject,
}

pub type TypeResult<T> = Result<T, TypeError>;
