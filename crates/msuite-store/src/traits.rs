use std::io::Read;

use msuite_types::{Identifier, PremisRecord};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Streaming handle over stored content.
pub type ContentReader = Box<dyn Read + Send>;

/// Content strategy: write-once bytes keyed by identifier.
///
/// All implementations must satisfy these invariants:
/// - `put_content` never overwrites. Existing content yields
///   [`StoreError::AlreadyExists`] and the stored bytes stay untouched.
/// - `put_content` is an atomic create-if-absent: of two concurrent writers
///   for one identifier, exactly one succeeds.
/// - `list_identifiers` is sorted lexicographically, so paging with
///   `offset`/`limit` is stable while the corpus is unchanged.
pub trait ContentStore: Send + Sync {
    /// One page of identifiers that have content, in lexicographic order.
    fn list_identifiers(&self, offset: usize, limit: usize) -> StoreResult<Vec<Identifier>>;

    fn content_exists(&self, id: &Identifier) -> StoreResult<bool>;

    /// Open stored content for streaming.
    ///
    /// Returns [`StoreError::NotFound`] if there is none.
    fn get_content(&self, id: &Identifier) -> StoreResult<ContentReader>;

    /// Store content, returning the number of bytes written.
    fn put_content(&self, id: &Identifier, content: &mut dyn Read) -> StoreResult<u64>;
}

/// Metadata strategy: one PREMIS record per identifier.
pub trait MetadataStore: Send + Sync {
    fn metadata_exists(&self, id: &Identifier) -> StoreResult<bool>;

    /// Returns [`StoreError::NotFound`] if there is no record.
    fn get_metadata(&self, id: &Identifier) -> StoreResult<PremisRecord>;

    /// Store a record. Overwriting an existing record is allowed and logged.
    fn put_metadata(&self, id: &Identifier, record: &PremisRecord) -> StoreResult<()>;

    /// Partial update of a stored record. Reserved.
    fn diff_metadata(&self, _id: &Identifier, _patch: &Value) -> StoreResult<()> {
        Err(StoreError::Unimplemented("metadata diff"))
    }
}

/// A complete MaterialSuite backend.
pub trait StorageBackend: ContentStore + MetadataStore {
    /// Short name of the variant, for logs and diagnostics.
    fn name(&self) -> &str;

    /// A suite exists when either half of it does.
    fn exists(&self, id: &Identifier) -> StoreResult<bool> {
        Ok(self.content_exists(id)? || self.metadata_exists(id)?)
    }

    /// The stored record in structural (JSON tree) form.
    fn get_metadata_json(&self, id: &Identifier) -> StoreResult<Value> {
        Ok(self.get_metadata(id)?.to_json()?)
    }
}

/// Parse stored keys back into identifiers, dropping (and logging) any that
/// are not valid identifiers.
pub(crate) fn parse_identifiers<I>(keys: I, source: &str) -> Vec<Identifier>
where
    I: IntoIterator<Item = String>,
{
    keys.into_iter()
        .filter_map(|key| match Identifier::parse(key) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(source, error = %e, "skipping stored key that is not a valid identifier");
                None
            }
        })
        .collect()
}

/// Slice one page out of an already sorted listing.
pub(crate) fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}
