use msuite_types::TypeError;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested content or metadata does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Content already stored under this identifier (write-once violation).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Reserved operation with no implementation yet.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),

    /// The underlying store is unreachable, misconfigured or returned
    /// something it should not have.
    #[error("backend error: {0}")]
    Backend(String),

    /// Stored metadata could not be decoded or encoded.
    #[error("metadata error: {0}")]
    Metadata(#[from] TypeError),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
