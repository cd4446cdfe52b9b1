use std::fmt;
use std::io::Read;
use std::sync::Arc;

use msuite_types::Identifier;

use crate::error::{StoreError, StoreResult};
use crate::traits::{parse_identifiers, ContentReader, ContentStore};

/// A chunked blob store (GridFS-style): blobs are split into fixed-size
/// chunks on write and reassembled on read.
pub trait BlobBucket: Send + Sync {
    /// Store a new blob. Fails with [`StoreError::AlreadyExists`] if `id` is
    /// taken; the check and the insert are atomic.
    fn create_exclusive(&self, id: &str, content: &mut dyn Read) -> StoreResult<u64>;

    fn open(&self, id: &str) -> StoreResult<Option<ContentReader>>;

    fn contains(&self, id: &str) -> StoreResult<bool>;

    /// One page of blob ids in ascending order.
    fn ids(&self, offset: usize, limit: usize) -> StoreResult<Vec<String>>;
}

/// Content strategy over a [`BlobBucket`], keyed directly by identifier.
pub struct BlobContentStore {
    bucket: Arc<dyn BlobBucket>,
}

impl BlobContentStore {
    pub fn new(bucket: Arc<dyn BlobBucket>) -> Self {
        Self { bucket }
    }
}

impl ContentStore for BlobContentStore {
    fn list_identifiers(&self, offset: usize, limit: usize) -> StoreResult<Vec<Identifier>> {
        Ok(parse_identifiers(self.bucket.ids(offset, limit)?, "blob bucket"))
    }

    fn content_exists(&self, id: &Identifier) -> StoreResult<bool> {
        self.bucket.contains(id.as_str())
    }

    fn get_content(&self, id: &Identifier) -> StoreResult<ContentReader> {
        self.bucket
            .open(id.as_str())?
            .ok_or_else(|| StoreError::NotFound(format!("content for {id}")))
    }

    fn put_content(&self, id: &Identifier, content: &mut dyn Read) -> StoreResult<u64> {
        if self.bucket.contains(id.as_str())? {
            return Err(StoreError::AlreadyExists(format!("content for {id}")));
        }
        self.bucket.create_exclusive(id.as_str(), content)
    }
}

impl fmt::Debug for BlobContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobContentStore").finish_non_exhaustive()
    }
}
