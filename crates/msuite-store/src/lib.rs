//! Storage backends for MaterialSuites.
//!
//! A MaterialSuite is a content blob plus a PREMIS record sharing one
//! [`Identifier`](msuite_types::Identifier). Storage is split into two
//! strategies, composed by [`SuiteBackend`] into a single [`StorageBackend`]:
//!
//! - [`ContentStore`]: write-once content, listing, streaming reads
//! - [`MetadataStore`]: overwritable PREMIS records
//!
//! # Strategies
//!
//! - [`FilesystemContentStore`] / [`FilesystemMetadataStore`]: pair-tree
//!   directories (`<root>/<pairtree>/arf/content.file`, `.../premis.xml`)
//! - [`BlobContentStore`]: chunked blobs in a [`BlobBucket`]
//! - [`DocumentMetadataStore`]: key-escaped JSON trees in a
//!   [`DocumentCollection`]
//! - [`ObjectContentStore`]: one object per suite in an [`ObjectClient`]
//!   bucket
//!
//! Document collections and blob buckets come in memory-backed and
//! directory-backed ([`LocalDocumentCollection`], [`LocalBlobBucket`])
//! flavours.
//!
//! [`open_backend`] turns a [`BackendConfig`] into a ready backend.
//!
//! # Design Rules
//!
//! 1. Content is write-once. Every `put_content` is an atomic create-if-absent.
//! 2. Metadata may be overwritten; overwrites are logged.
//! 3. Storage locations are always recomputed from the identifier.
//! 4. Listing is lexicographic on identifier and served by the content store.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod backend;
pub mod blob;
pub mod document;
pub mod error;
pub mod escape;
pub mod factory;
pub mod fs;
pub mod local;
pub mod memory;
pub mod object;
pub mod pairtree;
pub mod traits;

pub use backend::SuiteBackend;
pub use blob::{BlobBucket, BlobContentStore};
pub use document::{DocumentCollection, DocumentMetadataStore};
pub use error::{StoreError, StoreResult};
pub use escape::{escape_key, escape_keys, unescape_key, unescape_keys};
pub use factory::{open_backend, BackendConfig, MetadataConfig};
pub use fs::{FilesystemContentStore, FilesystemMetadataStore};
pub use local::{LocalBlobBucket, LocalDocumentCollection};
pub use memory::{InMemoryBlobBucket, InMemoryDocumentCollection, InMemoryObjectClient};
pub use object::{LocalObjectClient, ObjectClient, ObjectContentStore};
pub use pairtree::PairtreeMapper;
pub use traits::{ContentReader, ContentStore, MetadataStore, StorageBackend};
