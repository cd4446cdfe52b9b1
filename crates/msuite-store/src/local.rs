//! Directory-backed clients for the document and blob seams.
//!
//! These keep their data on local disk, so document and mixed backends
//! survive a restart without a database server. Names starting with `.`
//! are reserved for staging and never listed.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blob::BlobBucket;
use crate::document::DocumentCollection;
use crate::error::{StoreError, StoreResult};
use crate::memory::DEFAULT_BLOB_CHUNK_SIZE;
use crate::object::validate_name;
use crate::traits::{paginate, ContentReader};

const DOCUMENT_SUFFIX: &str = ".json";
const MANIFEST_FILE: &str = "manifest.json";

fn open_root(root: &Path) -> StoreResult<PathBuf> {
    fs::create_dir_all(root)?;
    if !root.is_dir() {
        return Err(StoreError::Config(format!("{} is not a directory", root.display())));
    }
    Ok(root.to_path_buf())
}

fn checked_name(name: &str) -> StoreResult<&str> {
    validate_name(name).map_err(|reason| StoreError::Backend(format!("name {name:?}: {reason}")))?;
    Ok(name)
}

fn listed_names(dir: &Path) -> StoreResult<Vec<(String, fs::FileType)>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        match entry.file_name().into_string() {
            Ok(name) if !name.starts_with('.') => names.push((name, entry.file_type()?)),
            Ok(_) => {}
            Err(name) => tracing::warn!(?name, dir = %dir.display(), "skipping non UTF-8 name"),
        }
    }
    Ok(names)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Document collection with one JSON file per document, `<root>/<id>.json`.
///
/// Upserts write a temporary file next to the target and rename it into
/// place, so readers see either the old or the new document.
#[derive(Debug)]
pub struct LocalDocumentCollection {
    root: PathBuf,
}

impl LocalDocumentCollection {
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self {
            root: open_root(root.as_ref())?,
        })
    }

    fn document_path(&self, id: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(format!("{}{DOCUMENT_SUFFIX}", checked_name(id)?)))
    }
}

impl DocumentCollection for LocalDocumentCollection {
    fn find_one(&self, id: &str) -> StoreResult<Option<Value>> {
        let path = self.document_path(id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Backend(format!("corrupt document {}: {e}", path.display())))
    }

    fn upsert_one(&self, id: &str, document: Value) -> StoreResult<bool> {
        let path = self.document_path(id)?;
        let replaced = path.is_file();
        let mut staged = tempfile::NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer(&mut staged, &document).map_err(|e| StoreError::Backend(e.to_string()))?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(replaced)
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.document_path(id)?.is_file())
    }

    fn ids(&self, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = listed_names(&self.root)?
            .into_iter()
            .filter(|(_, kind)| kind.is_file())
            .filter_map(|(name, _)| name.strip_suffix(DOCUMENT_SUFFIX).map(str::to_string))
            .collect();
        ids.sort();
        Ok(paginate(ids, offset, limit))
    }
}

// ---------------------------------------------------------------------------
// Chunked blobs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct BlobManifest {
    length: u64,
    chunk_size: usize,
    chunks: usize,
}

fn chunk_name(index: usize) -> String {
    format!("{index:08}")
}

/// Blob bucket with one directory per blob: numbered chunk files plus a
/// manifest.
///
/// A blob is assembled in a staging directory and renamed into place in one
/// step. The rename fails when the target exists, which makes creation
/// exclusive.
pub struct LocalBlobBucket {
    root: PathBuf,
    chunk_size: usize,
}

impl LocalBlobBucket {
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_chunk_size(root, DEFAULT_BLOB_CHUNK_SIZE)
    }

    pub fn with_chunk_size(root: impl AsRef<Path>, chunk_size: usize) -> StoreResult<Self> {
        if chunk_size == 0 {
            return Err(StoreError::Config("blob chunk size must be greater than zero".into()));
        }
        Ok(Self {
            root: open_root(root.as_ref())?,
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn blob_dir(&self, id: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(checked_name(id)?))
    }

    fn manifest(&self, dir: &Path) -> StoreResult<Option<BlobManifest>> {
        let bytes = match fs::read(dir.join(MANIFEST_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Backend(format!("corrupt blob manifest in {}: {e}", dir.display())))
    }

    fn write_chunks(&self, dir: &Path, content: &mut dyn Read) -> StoreResult<BlobManifest> {
        let mut manifest = BlobManifest {
            length: 0,
            chunk_size: self.chunk_size,
            chunks: 0,
        };
        loop {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            let n = (&mut *content).take(self.chunk_size as u64).read_to_end(&mut chunk)?;
            if n == 0 {
                break;
            }
            let mut file = File::create(dir.join(chunk_name(manifest.chunks)))?;
            file.write_all(&chunk)?;
            file.sync_all()?;
            manifest.length += n as u64;
            manifest.chunks += 1;
        }
        let file = File::create(dir.join(MANIFEST_FILE))?;
        serde_json::to_writer(&file, &manifest).map_err(|e| StoreError::Backend(e.to_string()))?;
        file.sync_all()?;
        Ok(manifest)
    }
}

impl BlobBucket for LocalBlobBucket {
    fn create_exclusive(&self, id: &str, content: &mut dyn Read) -> StoreResult<u64> {
        let target = self.blob_dir(id)?;
        if target.exists() {
            return Err(StoreError::AlreadyExists(format!("blob {id}")));
        }
        let staging = tempfile::Builder::new().prefix(".blob-").tempdir_in(&self.root)?;
        let manifest = self.write_chunks(staging.path(), content)?;
        match fs::rename(staging.path(), &target) {
            Ok(()) => {
                tracing::debug!(blob = id, chunks = manifest.chunks, "blob stored");
                Ok(manifest.length)
            }
            Err(_) if target.exists() => Err(StoreError::AlreadyExists(format!("blob {id}"))),
            Err(e) => Err(e.into()),
        }
    }

    fn open(&self, id: &str) -> StoreResult<Option<ContentReader>> {
        let dir = self.blob_dir(id)?;
        Ok(self.manifest(&dir)?.map(|manifest| {
            Box::new(ChunkReader {
                dir,
                next: 0,
                chunks: manifest.chunks,
                current: None,
            }) as ContentReader
        }))
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.blob_dir(id)?.join(MANIFEST_FILE).is_file())
    }

    fn ids(&self, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = listed_names(&self.root)?
            .into_iter()
            .filter(|(name, kind)| kind.is_dir() && self.root.join(name).join(MANIFEST_FILE).is_file())
            .map(|(name, _)| name)
            .collect();
        ids.sort();
        Ok(paginate(ids, offset, limit))
    }
}

impl fmt::Debug for LocalBlobBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBlobBucket")
            .field("root", &self.root)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Reads a blob's chunk files in order, opening one at a time.
struct ChunkReader {
    dir: PathBuf,
    next: usize,
    chunks: usize,
    current: Option<File>,
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() {
                if self.next == self.chunks {
                    return Ok(0);
                }
                self.current = Some(File::open(self.dir.join(chunk_name(self.next)))?);
                self.next += 1;
            }
            if let Some(file) = self.current.as_mut() {
                let n = file.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
            }
            self.current = None;
        }
    }
}
