use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use msuite_types::Identifier;

use crate::error::{StoreError, StoreResult};
use crate::traits::{paginate, parse_identifiers, ContentReader, ContentStore};

/// Minimal object-storage client: buckets of keyed, immutable objects.
pub trait ObjectClient: Send + Sync {
    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    fn head_object(&self, bucket: &str, key: &str) -> StoreResult<bool>;

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ContentReader>>;

    /// Conditional write: succeeds only if the key does not exist yet.
    ///
    /// Returns `Ok(true)` if the object was created, `Ok(false)` if the key
    /// was already taken (nothing written).
    fn put_object_if_absent(&self, bucket: &str, key: &str, body: &mut dyn Read) -> StoreResult<bool>;

    /// One page of keys in ascending order.
    fn list_keys(&self, bucket: &str, offset: usize, limit: usize) -> StoreResult<Vec<String>>;
}

/// Content strategy storing each suite as one object keyed by identifier.
pub struct ObjectContentStore {
    client: Arc<dyn ObjectClient>,
    bucket: String,
}

impl ObjectContentStore {
    /// Bind to `bucket`, creating it if it does not exist yet.
    pub fn new(client: Arc<dyn ObjectClient>, bucket: impl Into<String>) -> StoreResult<Self> {
        let bucket = bucket.into();
        validate_name(&bucket).map_err(|reason| StoreError::Config(format!("bucket {bucket:?}: {reason}")))?;
        if !client.bucket_exists(&bucket)? {
            tracing::info!(%bucket, "creating bucket");
            client.create_bucket(&bucket)?;
        }
        Ok(Self { client, bucket })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl ContentStore for ObjectContentStore {
    fn list_identifiers(&self, offset: usize, limit: usize) -> StoreResult<Vec<Identifier>> {
        let keys = self.client.list_keys(&self.bucket, offset, limit)?;
        Ok(parse_identifiers(keys, &self.bucket))
    }

    fn content_exists(&self, id: &Identifier) -> StoreResult<bool> {
        self.client.head_object(&self.bucket, id.as_str())
    }

    fn get_content(&self, id: &Identifier) -> StoreResult<ContentReader> {
        self.client
            .get_object(&self.bucket, id.as_str())?
            .ok_or_else(|| StoreError::NotFound(format!("content for {id}")))
    }

    fn put_content(&self, id: &Identifier, content: &mut dyn Read) -> StoreResult<u64> {
        if self.content_exists(id)? {
            return Err(StoreError::AlreadyExists(format!("content for {id}")));
        }
        let mut counted = CountingReader { inner: content, count: 0 };
        if !self.client.put_object_if_absent(&self.bucket, id.as_str(), &mut counted)? {
            return Err(StoreError::AlreadyExists(format!("content for {id}")));
        }
        Ok(counted.count)
    }
}

impl fmt::Debug for ObjectContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectContentStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

struct CountingReader<'a> {
    inner: &'a mut dyn Read,
    count: u64,
}

impl Read for CountingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Bucket and key names must be usable as a single file name.
pub(crate) fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("must not be empty");
    }
    if name.starts_with('.') {
        return Err("must not start with '.'");
    }
    if name.contains(['/', '\\', '\0']) {
        return Err("must not contain path separators or NUL");
    }
    Ok(())
}

/// Object client over a local directory: one sub-directory per bucket, one
/// file per object.
///
/// Conditional writes go through a temporary file in the bucket directory
/// and a no-clobber link, so concurrent writers of one key have exactly one
/// winner. Dot-files are reserved for those temporaries and never listed.
#[derive(Debug)]
pub struct LocalObjectClient {
    root: PathBuf,
}

impl LocalObjectClient {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(StoreError::Config(format!("{} is not a directory", root.display())));
        }
        Ok(Self { root })
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        validate_name(bucket).map_err(|reason| StoreError::Backend(format!("bucket {bucket:?}: {reason}")))?;
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(StoreError::Backend(format!("no such bucket: {bucket}")));
        }
        Ok(dir)
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(key).map_err(|reason| StoreError::Backend(format!("key {key:?}: {reason}")))?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

impl ObjectClient for LocalObjectClient {
    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.root.join(bucket).is_dir())
    }

    fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        validate_name(bucket).map_err(|reason| StoreError::Backend(format!("bucket {bucket:?}: {reason}")))?;
        fs::create_dir_all(self.root.join(bucket))?;
        Ok(())
    }

    fn head_object(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ContentReader>> {
        match File::open(self.object_path(bucket, key)?) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_object_if_absent(&self, bucket: &str, key: &str, body: &mut dyn Read) -> StoreResult<bool> {
        let path = self.object_path(bucket, key)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        io::copy(body, &mut staged)?;
        staged.as_file().sync_all()?;
        match staged.persist_noclobber(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error.into()),
        }
    }

    fn list_keys(&self, bucket: &str, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(self.bucket_dir(bucket)?)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => keys.push(name),
                Ok(_) => {}
                Err(name) => tracing::warn!(?name, bucket, "skipping non UTF-8 object name"),
            }
        }
        keys.sort();
        Ok(paginate(keys, offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObjectClient;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn bucket_is_created_on_construction() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(LocalObjectClient::new(dir.path()).unwrap());
        assert!(!client.bucket_exists("suites").unwrap());
        let store = ObjectContentStore::new(client.clone(), "suites").unwrap();
        assert!(client.bucket_exists("suites").unwrap());
        assert_eq!(store.bucket(), "suites");
        // Binding again to an existing bucket is fine.
        ObjectContentStore::new(client, "suites").unwrap();
    }

    #[test]
    fn bad_bucket_names_fail_at_construction() {
        let client: Arc<dyn ObjectClient> = Arc::new(InMemoryObjectClient::new());
        for name in ["", ".hidden", "a/b"] {
            assert!(matches!(
                ObjectContentStore::new(client.clone(), name),
                Err(StoreError::Config(_))
            ));
        }
    }

    #[test]
    fn local_client_put_is_conditional() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalObjectClient::new(dir.path()).unwrap();
        client.create_bucket("b").unwrap();
        assert!(client.put_object_if_absent("b", "k", &mut &b"first"[..]).unwrap());
        assert!(!client.put_object_if_absent("b", "k", &mut &b"second"[..]).unwrap());

        let mut back = String::new();
        client.get_object("b", "k").unwrap().unwrap().read_to_string(&mut back).unwrap();
        assert_eq!(back, "first");
        // No temporaries left behind in the listing.
        assert_eq!(client.list_keys("b", 0, 10).unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn local_client_rejects_unsafe_keys_and_missing_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalObjectClient::new(dir.path()).unwrap();
        client.create_bucket("b").unwrap();
        assert!(matches!(client.head_object("b", "../x"), Err(StoreError::Backend(_))));
        assert!(matches!(client.head_object("nope", "k"), Err(StoreError::Backend(_))));
        assert!(client.get_object("b", "absent").unwrap().is_none());
    }

    #[test]
    fn put_content_reports_bytes_written() {
        let store = ObjectContentStore::new(Arc::new(InMemoryObjectClient::new()), "suites").unwrap();
        assert_eq!(store.put_content(&id("doc1"), &mut &b"hello"[..]).unwrap(), 5);
        assert!(store.content_exists(&id("doc1")).unwrap());
        assert!(matches!(
            store.put_content(&id("doc1"), &mut &b"x"[..]),
            Err(StoreError::AlreadyExists(_))
        ));
    }
}
