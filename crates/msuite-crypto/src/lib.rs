//! Fixity primitives for MaterialSuite storage.
//!
//! Content is digested in fixed-size chunks so memory use stays bounded
//! regardless of payload size. Only MD5 fixity is recognized today.

pub mod checksum;

pub use checksum::{ChecksumError, ChecksumVerifier, DigestAlgorithm, DigestValue, DEFAULT_CHUNK_SIZE};
