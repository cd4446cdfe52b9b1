use msuite_crypto::ChecksumError;
use msuite_store::StoreError;
use msuite_types::{HistoryChange, TypeError};

/// Errors from ingesting or amending a MaterialSuite.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The record's identifier is empty, too long or not its own sanitized
    /// form.
    #[error("insecure identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Content is already stored under this identifier.
    #[error("materialsuite already exists: {0}")]
    AlreadyExists(String),

    /// Computed digest differs from the one the record declares.
    #[error("integrity mismatch for {identifier}: declared {declared}, computed {computed}")]
    IntegrityMismatch {
        identifier: String,
        declared: String,
        computed: String,
    },

    /// The record declares no fixity for the required algorithm.
    #[error("record for {identifier} declares no {algorithm} fixity")]
    MissingFixity { identifier: String, algorithm: String },

    /// Amendment of a suite that has no metadata.
    #[error("no materialsuite metadata for {0}")]
    NotFound(String),

    /// Amended record describes a different suite than the one addressed.
    #[error("record identifier {found:?} does not match {expected}")]
    IdentifierMismatch { expected: String, found: String },

    /// Amended record drops or alters events, links or fixity the stored
    /// record carries.
    #[error("amendment of {identifier} rewrites recorded history: {change}")]
    HistoryRewritten {
        identifier: String,
        change: HistoryChange,
    },

    /// The metadata record could not be decoded or encoded.
    #[error("metadata error: {0}")]
    Metadata(#[from] TypeError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ingest configuration: {0}")]
    Config(#[from] ChecksumError),
}

/// Result alias for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;
