use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use msuite_crypto::{ChecksumVerifier, DigestAlgorithm, DigestValue, DEFAULT_CHUNK_SIZE};
use msuite_store::{StorageBackend, StoreError};
use msuite_types::{Identifier, PremisRecord};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{IngestError, IngestResult};
use crate::locks::IdentifierLocks;
use crate::provenance::ProvenanceEventBuilder;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Ingest settings, the `[ingest]` table of the service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Read size used while digesting content.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Where content is staged before it is verified. Defaults to the
    /// system temporary directory.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            staging_dir: None,
        }
    }
}

/// Where an ingest currently is. Reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Start,
    ContentStaged,
    ContentVerified,
    EventAttached,
    MetadataPersisted,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::ContentStaged => "content_staged",
            Self::ContentVerified => "content_verified",
            Self::EventAttached => "event_attached",
            Self::MetadataPersisted => "metadata_persisted",
            Self::Failed => "failed",
        })
    }
}

/// Turns (content, metadata) pairs into stored MaterialSuites.
///
/// Content is streamed into a staging file while its digest is computed and
/// only committed to the backend once it matches the record's md5 fixity, so
/// a failed integrity check leaves nothing behind. Metadata is written last,
/// carrying a new `ingestion` event.
pub struct IngestPipeline {
    backend: Arc<dyn StorageBackend>,
    verifier: ChecksumVerifier,
    staging_dir: Option<PathBuf>,
    locks: IdentifierLocks,
    events: ProvenanceEventBuilder,
}

impl IngestPipeline {
    pub fn new(backend: Arc<dyn StorageBackend>, config: &IngestConfig) -> IngestResult<Self> {
        let verifier = ChecksumVerifier::new(config.chunk_size)?;
        if let Some(dir) = &config.staging_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            backend,
            verifier,
            staging_dir: config.staging_dir.clone(),
            locks: IdentifierLocks::new(),
            events: ProvenanceEventBuilder::ingestion(),
        })
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Configured staging directory, if any. Callers spooling uploads before
    /// handing them to [`add`](Self::add) should use it too.
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }

    /// Ingest a new MaterialSuite and return its identifier.
    ///
    /// No step is retried; the first failure is returned. A failure after the
    /// content commit leaves content without metadata and is logged at
    /// `error` level.
    pub fn add(&self, content: &mut dyn Read, raw_metadata: &[u8]) -> IngestResult<Identifier> {
        let mut record = PremisRecord::parse(raw_metadata)?;
        let id = self.check_identifier(&record)?;
        let declared = Self::declared_digest(&record, &id)?;
        tracing::debug!(%id, stage = %IngestStage::Start, "ingest accepted");

        if self.backend.content_exists(&id)? {
            tracing::warn!(%id, stage = %IngestStage::Failed, "content already exists");
            return Err(IngestError::AlreadyExists(id.into_string()));
        }

        let mut staged = self.staging_file()?;
        let (computed, size) = self
            .verifier
            .digest_into(content, staged.as_file_mut(), DigestAlgorithm::Md5)?;
        tracing::debug!(%id, stage = %IngestStage::ContentStaged, size, "content staged");

        if !ChecksumVerifier::verify(&computed, &declared) {
            tracing::warn!(
                %id,
                stage = %IngestStage::Failed,
                declared = %declared,
                computed = %computed,
                "integrity check failed"
            );
            return Err(IngestError::IntegrityMismatch {
                identifier: id.into_string(),
                declared: declared.as_str().to_string(),
                computed: computed.as_str().to_string(),
            });
        }

        staged.as_file_mut().seek(SeekFrom::Start(0))?;
        match self.backend.put_content(&id, staged.as_file_mut()) {
            Ok(_) => {}
            Err(StoreError::AlreadyExists(_)) => {
                tracing::warn!(%id, stage = %IngestStage::Failed, "lost race for content");
                return Err(IngestError::AlreadyExists(id.into_string()));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(%id, stage = %IngestStage::ContentVerified, "content committed");

        self.events.attach(&mut record)?;
        tracing::debug!(%id, stage = %IngestStage::EventAttached, "ingestion event attached");

        let persisted = self
            .locks
            .with_lock(&id, || self.backend.put_metadata(&id, &record));
        if let Err(e) = persisted {
            tracing::error!(
                %id,
                stage = %IngestStage::Failed,
                error = %e,
                "metadata write failed; content stored without metadata"
            );
            return Err(e.into());
        }
        tracing::debug!(%id, stage = %IngestStage::MetadataPersisted, "metadata persisted");
        tracing::info!(%id, size, backend = self.backend.name(), "materialsuite ingested");
        Ok(id)
    }

    /// Replace the metadata record of an existing MaterialSuite.
    ///
    /// The record must describe `id` and metadata must already exist; this
    /// never creates a suite. The replacement may add to the stored record's
    /// events, links and fixity but not drop or alter them. Amendments of one
    /// identifier are serialized.
    pub fn amend_metadata(&self, id: &Identifier, raw_metadata: &[u8]) -> IngestResult<()> {
        let record = PremisRecord::parse(raw_metadata)?;
        let found = record.identifier_value()?;
        if found != id.as_str() {
            return Err(IngestError::IdentifierMismatch {
                expected: id.to_string(),
                found,
            });
        }
        self.locks.with_lock(id, || {
            if !self.backend.metadata_exists(id)? {
                return Err(IngestError::NotFound(id.to_string()));
            }
            let stored = self.backend.get_metadata(id)?;
            if let Err(change) = record.preserves_history_of(&stored) {
                tracing::warn!(%id, %change, "amendment rejected");
                return Err(IngestError::HistoryRewritten {
                    identifier: id.to_string(),
                    change,
                });
            }
            self.backend.put_metadata(id, &record)?;
            tracing::info!(%id, "metadata amended");
            Ok(())
        })
    }

    fn check_identifier(&self, record: &PremisRecord) -> IngestResult<Identifier> {
        let declared = record.identifier_value()?;
        Identifier::parse(declared.as_str()).map_err(|_| {
            tracing::error!(identifier = ?declared, "insecure identifier rejected");
            IngestError::InvalidIdentifier(declared)
        })
    }

    fn declared_digest(record: &PremisRecord, id: &Identifier) -> IngestResult<DigestValue> {
        let algorithm = DigestAlgorithm::Md5;
        record
            .first_object()?
            .fixity(algorithm.label())
            .map(DigestValue::new)
            .ok_or_else(|| {
                tracing::warn!(%id, "record declares no md5 fixity");
                IngestError::MissingFixity {
                    identifier: id.to_string(),
                    algorithm: algorithm.label().to_string(),
                }
            })
    }

    fn staging_file(&self) -> IngestResult<NamedTempFile> {
        Ok(match &self.staging_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        })
    }
}

impl fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("backend", &self.backend.name())
            .field("chunk_size", &self.verifier.chunk_size())
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}
