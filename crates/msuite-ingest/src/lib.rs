//! Ingest pipeline for MaterialSuites.
//!
//! [`IngestPipeline::add`] takes raw content and a raw PREMIS record and
//! walks them through identifier validation, fixity verification, content
//! commit, provenance event and metadata persist, in that order.
//! [`IngestPipeline::amend_metadata`] replaces the record of an existing
//! suite.

pub mod error;
pub mod locks;
pub mod pipeline;
pub mod provenance;

pub use error::{IngestError, IngestResult};
pub use locks::IdentifierLocks;
pub use pipeline::{IngestConfig, IngestPipeline, IngestStage};
pub use provenance::{ProvenanceEventBuilder, INGESTION_EVENT_DETAIL, INGESTION_EVENT_TYPE};
