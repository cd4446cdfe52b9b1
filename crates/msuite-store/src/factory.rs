use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::SuiteBackend;
use crate::blob::{BlobBucket, BlobContentStore};
use crate::document::{DocumentCollection, DocumentMetadataStore};
use crate::error::StoreResult;
use crate::fs::{FilesystemContentStore, FilesystemMetadataStore};
use crate::local::{LocalBlobBucket, LocalDocumentCollection};
use crate::memory::{InMemoryBlobBucket, InMemoryDocumentCollection, InMemoryObjectClient, DEFAULT_BLOB_CHUNK_SIZE};
use crate::object::{LocalObjectClient, ObjectClient, ObjectContentStore};
use crate::traits::StorageBackend;

fn default_blob_chunk_size() -> usize {
    DEFAULT_BLOB_CHUNK_SIZE
}

/// Which backend variant to build, and where it keeps its data.
///
/// Deserialized from the `[backend]` table of the service configuration;
/// the `kind` key selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Chunked blobs for content, documents for metadata. Both live under
    /// `root` (`blobs/` and `documents/`); without it they are kept in
    /// memory.
    Document {
        #[serde(default = "default_blob_chunk_size")]
        blob_chunk_size: usize,
        #[serde(default)]
        root: Option<PathBuf>,
    },
    /// Pair-tree directories for both halves.
    Filesystem {
        content_root: PathBuf,
        metadata_root: PathBuf,
    },
    /// Pair-tree content, document metadata. Documents live under
    /// `document_root`, or in memory without it.
    Mixed {
        content_root: PathBuf,
        #[serde(default)]
        document_root: Option<PathBuf>,
    },
    /// One object per suite in `bucket`. Without `object_root` the objects
    /// are kept in memory.
    ObjectStore {
        bucket: String,
        #[serde(default)]
        object_root: Option<PathBuf>,
        metadata: MetadataConfig,
    },
}

/// Metadata strategy for the object-store variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetadataConfig {
    Filesystem {
        root: PathBuf,
    },
    /// Documents under `root`, or in memory without it.
    Document {
        #[serde(default)]
        root: Option<PathBuf>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Filesystem {
            content_root: PathBuf::from("data/lts"),
            metadata_root: PathBuf::from("data/premis"),
        }
    }
}

impl BackendConfig {
    /// The `kind` tag of this variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Document { .. } => "document",
            Self::Filesystem { .. } => "filesystem",
            Self::Mixed { .. } => "mixed",
            Self::ObjectStore { .. } => "object_store",
        }
    }

    /// Whether both halves of the backend keep their data on disk.
    pub fn is_durable(&self) -> bool {
        match self {
            Self::Document { root, .. } => root.is_some(),
            Self::Filesystem { .. } => true,
            Self::Mixed { document_root, .. } => document_root.is_some(),
            Self::ObjectStore {
                object_root,
                metadata,
                ..
            } => {
                object_root.is_some()
                    && match metadata {
                        MetadataConfig::Filesystem { .. } => true,
                        MetadataConfig::Document { root } => root.is_some(),
                    }
            }
        }
    }
}

fn document_metadata(root: Option<&Path>) -> StoreResult<DocumentMetadataStore> {
    let collection: Arc<dyn DocumentCollection> = match root {
        Some(root) => Arc::new(LocalDocumentCollection::new(root)?),
        None => {
            tracing::warn!("document metadata is held in memory and lost on restart");
            Arc::new(InMemoryDocumentCollection::new())
        }
    };
    Ok(DocumentMetadataStore::new(collection))
}

/// Build the backend described by `config`.
///
/// Roots are created, buckets ensured and chunk sizes checked here, so a
/// backend that opens successfully is ready for requests.
pub fn open_backend(config: &BackendConfig) -> StoreResult<Arc<dyn StorageBackend>> {
    let name = config.kind_name();
    let backend: Arc<dyn StorageBackend> = match config {
        BackendConfig::Document {
            blob_chunk_size,
            root,
        } => {
            let bucket: Arc<dyn BlobBucket> = match root {
                Some(root) => Arc::new(LocalBlobBucket::with_chunk_size(root.join("blobs"), *blob_chunk_size)?),
                None => {
                    tracing::warn!("blob content is held in memory and lost on restart");
                    Arc::new(InMemoryBlobBucket::with_chunk_size(*blob_chunk_size)?)
                }
            };
            let documents = root.as_ref().map(|root| root.join("documents"));
            Arc::new(SuiteBackend::new(
                name,
                BlobContentStore::new(bucket),
                document_metadata(documents.as_deref())?,
            ))
        }
        BackendConfig::Filesystem {
            content_root,
            metadata_root,
        } => Arc::new(SuiteBackend::new(
            name,
            FilesystemContentStore::new(content_root)?,
            FilesystemMetadataStore::new(metadata_root)?,
        )),
        BackendConfig::Mixed {
            content_root,
            document_root,
        } => Arc::new(SuiteBackend::new(
            name,
            FilesystemContentStore::new(content_root)?,
            document_metadata(document_root.as_deref())?,
        )),
        BackendConfig::ObjectStore {
            bucket,
            object_root,
            metadata,
        } => {
            let client: Arc<dyn ObjectClient> = match object_root {
                Some(root) => Arc::new(LocalObjectClient::new(root)?),
                None => {
                    tracing::warn!("object content is held in memory and lost on restart");
                    Arc::new(InMemoryObjectClient::new())
                }
            };
            let content = ObjectContentStore::new(client, bucket.as_str())?;
            match metadata {
                MetadataConfig::Filesystem { root } => Arc::new(SuiteBackend::new(
                    name,
                    content,
                    FilesystemMetadataStore::new(root)?,
                )),
                MetadataConfig::Document { root } => Arc::new(SuiteBackend::new(
                    name,
                    content,
                    document_metadata(root.as_deref())?,
                )),
            }
        }
    };
    tracing::info!(backend = name, "storage backend ready");
    Ok(backend)
}
