use std::fmt;
use std::io::Read;

use msuite_types::{Identifier, PremisRecord};
use serde_json::Value;

use crate::error::StoreResult;
use crate::traits::{ContentReader, ContentStore, MetadataStore, StorageBackend};

/// A backend assembled from one content strategy and one metadata strategy.
///
/// Every variant (filesystem, document/blob, object store and the mixed
/// ones) is a `SuiteBackend` with different type parameters.
pub struct SuiteBackend<C, M> {
    name: String,
    content: C,
    metadata: M,
}

impl<C: ContentStore, M: MetadataStore> SuiteBackend<C, M> {
    pub fn new(name: impl Into<String>, content: C, metadata: M) -> Self {
        Self {
            name: name.into(),
            content,
            metadata,
        }
    }

    pub fn content_store(&self) -> &C {
        &self.content
    }

    pub fn metadata_store(&self) -> &M {
        &self.metadata
    }
}

impl<C: ContentStore, M: MetadataStore> ContentStore for SuiteBackend<C, M> {
    fn list_identifiers(&self, offset: usize, limit: usize) -> StoreResult<Vec<Identifier>> {
        self.content.list_identifiers(offset, limit)
    }

    fn content_exists(&self, id: &Identifier) -> StoreResult<bool> {
        self.content.content_exists(id)
    }

    fn get_content(&self, id: &Identifier) -> StoreResult<ContentReader> {
        self.content.get_content(id)
    }

    fn put_content(&self, id: &Identifier, content: &mut dyn Read) -> StoreResult<u64> {
        self.content.put_content(id, content)
    }
}

impl<C: ContentStore, M: MetadataStore> MetadataStore for SuiteBackend<C, M> {
    fn metadata_exists(&self, id: &Identifier) -> StoreResult<bool> {
        self.metadata.metadata_exists(id)
    }

    fn get_metadata(&self, id: &Identifier) -> StoreResult<PremisRecord> {
        self.metadata.get_metadata(id)
    }

    fn put_metadata(&self, id: &Identifier, record: &PremisRecord) -> StoreResult<()> {
        self.metadata.put_metadata(id, record)
    }

    fn diff_metadata(&self, id: &Identifier, patch: &Value) -> StoreResult<()> {
        self.metadata.diff_metadata(id, patch)
    }
}

impl<C: ContentStore, M: MetadataStore> StorageBackend for SuiteBackend<C, M> {
    fn name(&self) -> &str {
        &self.name
    }
}

impl<C, M> fmt::Debug for SuiteBackend<C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteBackend")
            .field("name", &self.name)
            .finish()
    }
}
