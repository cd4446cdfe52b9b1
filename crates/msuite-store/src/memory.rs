//! In-memory clients for the document, blob and object seams.
//!
//! Each client keeps its data in a `BTreeMap` behind an `RwLock`, so listings
//! come out sorted and concurrent reads are safe. Create-if-absent writes
//! check and insert under a single write lock.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::blob::BlobBucket;
use crate::document::DocumentCollection;
use crate::error::{StoreError, StoreResult};
use crate::object::ObjectClient;
use crate::traits::{paginate, ContentReader};

/// Default blob chunk size, matching the usual GridFS chunk (255 KiB).
pub const DEFAULT_BLOB_CHUNK_SIZE: usize = 255 * 1024;

fn page_of_keys<V>(map: &BTreeMap<String, V>, offset: usize, limit: usize) -> Vec<String> {
    map.keys().skip(offset).take(limit).cloned().collect()
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// `BTreeMap`-backed document collection.
pub struct InMemoryDocumentCollection {
    documents: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryDocumentCollection {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryDocumentCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCollection for InMemoryDocumentCollection {
    fn find_one(&self, id: &str) -> StoreResult<Option<Value>> {
        let map = self.documents.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn upsert_one(&self, id: &str, document: Value) -> StoreResult<bool> {
        let mut map = self.documents.write().expect("lock poisoned");
        Ok(map.insert(id.to_string(), document).is_some())
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        let map = self.documents.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn ids(&self, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let map = self.documents.read().expect("lock poisoned");
        Ok(page_of_keys(&map, offset, limit))
    }
}

impl fmt::Debug for InMemoryDocumentCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDocumentCollection")
            .field("document_count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Chunked blobs
// ---------------------------------------------------------------------------

/// Chunked blob bucket. Blobs are held as a list of fixed-size chunks shared
/// with readers, so opening a blob never copies it.
pub struct InMemoryBlobBucket {
    chunk_size: usize,
    blobs: RwLock<BTreeMap<String, Arc<Vec<Vec<u8>>>>>,
}

impl InMemoryBlobBucket {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_BLOB_CHUNK_SIZE,
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_chunk_size(chunk_size: usize) -> StoreResult<Self> {
        if chunk_size == 0 {
            return Err(StoreError::Config("blob chunk size must be greater than zero".into()));
        }
        Ok(Self {
            chunk_size,
            ..Self::new()
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a stored blob occupies.
    pub fn chunk_count(&self, id: &str) -> Option<usize> {
        let map = self.blobs.read().expect("lock poisoned");
        map.get(id).map(|chunks| chunks.len())
    }

    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryBlobBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobBucket for InMemoryBlobBucket {
    fn create_exclusive(&self, id: &str, content: &mut dyn Read) -> StoreResult<u64> {
        let mut chunks = Vec::new();
        let mut total = 0u64;
        loop {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            let n = (&mut *content).take(self.chunk_size as u64).read_to_end(&mut chunk)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            chunks.push(chunk);
        }
        let mut map = self.blobs.write().expect("lock poisoned");
        match map.entry(id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(format!("blob {id}"))),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(chunks));
                Ok(total)
            }
        }
    }

    fn open(&self, id: &str) -> StoreResult<Option<ContentReader>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(id).map(|chunks| {
            Box::new(ChunkReader {
                chunks: Arc::clone(chunks),
                index: 0,
                offset: 0,
            }) as ContentReader
        }))
    }

    fn contains(&self, id: &str) -> StoreResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn ids(&self, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(page_of_keys(&map, offset, limit))
    }
}

impl fmt::Debug for InMemoryBlobBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBlobBucket")
            .field("chunk_size", &self.chunk_size)
            .field("blob_count", &self.len())
            .finish()
    }
}

struct ChunkReader {
    chunks: Arc<Vec<Vec<u8>>>,
    index: usize,
    offset: usize,
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(chunk) = self.chunks.get(self.index) {
            let rest = &chunk[self.offset..];
            if rest.is_empty() {
                self.index += 1;
                self.offset = 0;
                continue;
            }
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.offset += n;
            return Ok(n);
        }
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

type Bucket = BTreeMap<String, Arc<[u8]>>;

/// Object client holding buckets in memory.
pub struct InMemoryObjectClient {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

fn no_such_bucket(bucket: &str) -> StoreError {
    StoreError::Backend(format!("no such bucket: {bucket}"))
}

impl ObjectClient for InMemoryObjectClient {
    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.buckets.read().expect("lock poisoned").contains_key(bucket))
    }

    fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().expect("lock poisoned");
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn head_object(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(objects.contains_key(key))
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ContentReader>> {
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(objects
            .get(key)
            .map(|body| Box::new(Cursor::new(Arc::clone(body))) as ContentReader))
    }

    fn put_object_if_absent(&self, bucket: &str, key: &str, body: &mut dyn Read) -> StoreResult<bool> {
        let mut data = Vec::new();
        body.read_to_end(&mut data)?;
        let mut buckets = self.buckets.write().expect("lock poisoned");
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        match objects.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Arc::from(data));
                Ok(true)
            }
        }
    }

    fn list_keys(&self, bucket: &str, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(paginate(objects.keys().cloned().collect(), offset, limit))
    }
}

impl fmt::Debug for InMemoryObjectClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.buckets.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryObjectClient")
            .field("bucket_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(mut reader: ContentReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn document_upsert_reports_replacement() {
        let c = InMemoryDocumentCollection::new();
        assert!(c.is_empty());
        assert!(!c.upsert_one("a", serde_json::json!({"v": 1})).unwrap());
        assert!(c.upsert_one("a", serde_json::json!({"v": 2})).unwrap());
        assert_eq!(c.find_one("a").unwrap().unwrap()["v"], 2);
        assert_eq!(c.len(), 1);
        assert!(c.find_one("b").unwrap().is_none());
    }

    #[test]
    fn document_ids_are_sorted_pages() {
        let c = InMemoryDocumentCollection::new();
        for id in ["c", "a", "b", "d"] {
            c.upsert_one(id, Value::Null).unwrap();
        }
        assert_eq!(c.ids(1, 2).unwrap(), vec!["b", "c"]);
        assert!(c.ids(10, 2).unwrap().is_empty());
    }

    #[test]
    fn blob_chunks_and_reassembles() {
        let bucket = InMemoryBlobBucket::with_chunk_size(4).unwrap();
        assert_eq!(bucket.create_exclusive("x", &mut &b"0123456789"[..]).unwrap(), 10);
        assert_eq!(bucket.chunk_count("x"), Some(3));
        assert_eq!(read_all(bucket.open("x").unwrap().unwrap()), b"0123456789");
        assert!(bucket.open("y").unwrap().is_none());
    }

    #[test]
    fn empty_blob_has_no_chunks() {
        let bucket = InMemoryBlobBucket::new();
        assert_eq!(bucket.create_exclusive("e", &mut &b""[..]).unwrap(), 0);
        assert_eq!(bucket.chunk_count("e"), Some(0));
        assert!(read_all(bucket.open("e").unwrap().unwrap()).is_empty());
    }

    #[test]
    fn blob_create_is_exclusive() {
        let bucket = InMemoryBlobBucket::new();
        bucket.create_exclusive("x", &mut &b"a"[..]).unwrap();
        assert!(matches!(
            bucket.create_exclusive("x", &mut &b"b"[..]),
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(read_all(bucket.open("x").unwrap().unwrap()), b"a");
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(InMemoryBlobBucket::with_chunk_size(0), Err(StoreError::Config(_))));
    }

    #[test]
    fn object_client_requires_bucket() {
        let client = InMemoryObjectClient::new();
        assert!(matches!(client.head_object("b", "k"), Err(StoreError::Backend(_))));
        client.create_bucket("b").unwrap();
        assert!(!client.head_object("b", "k").unwrap());
        assert!(client.put_object_if_absent("b", "k", &mut &b"v"[..]).unwrap());
        assert!(!client.put_object_if_absent("b", "k", &mut &b"w"[..]).unwrap());
        assert_eq!(read_all(client.get_object("b", "k").unwrap().unwrap()), b"v");
        assert_eq!(client.list_keys("b", 0, 5).unwrap(), vec!["k"]);
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", InMemoryBlobBucket::new());
        assert!(debug.contains("InMemoryBlobBucket"));
        assert!(debug.contains("blob_count"));
    }
}
