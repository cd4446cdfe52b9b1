//! Pair-tree filesystem strategies.
//!
//! Both strategies place files inside the suite's encapsulation directory,
//! `<root>/<pairtree>/arf/`. Content and metadata roots may be the same
//! directory; the file names keep them apart.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use msuite_types::{Identifier, PremisRecord};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::pairtree::{PairtreeMapper, ENCAPSULATION_DIR};
use crate::traits::{paginate, ContentReader, ContentStore, MetadataStore};

pub const CONTENT_FILE_NAME: &str = "content.file";
pub const METADATA_FILE_NAME: &str = "premis.xml";

/// Create `root` if needed and make sure it is a directory.
fn prepare_root(root: PathBuf) -> StoreResult<PathBuf> {
    fs::create_dir_all(&root)?;
    if !root.is_dir() {
        return Err(StoreError::Config(format!("{} is not a directory", root.display())));
    }
    Ok(root)
}

fn suite_dir(root: &Path, mapper: &PairtreeMapper, id: &Identifier) -> PathBuf {
    root.join(mapper.locate(id))
}

/// Staging file next to `path`, so the final rename never crosses a device.
fn stage_beside(path: &Path) -> StoreResult<NamedTempFile> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Backend(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent)?;
    Ok(NamedTempFile::new_in(parent)?)
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Content files at `<root>/<pairtree>/arf/content.file`.
#[derive(Debug)]
pub struct FilesystemContentStore {
    root: PathBuf,
    mapper: PairtreeMapper,
}

impl FilesystemContentStore {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            root: prepare_root(root.into())?,
            mapper: PairtreeMapper::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the content file for `id`.
    pub fn content_path(&self, id: &Identifier) -> PathBuf {
        suite_dir(&self.root, &self.mapper, id).join(CONTENT_FILE_NAME)
    }

    /// Walk the whole tree and collect every identifier that has content.
    fn scan_identifiers(&self) -> StoreResult<Vec<Identifier>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(3) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || entry.file_name() != CONTENT_FILE_NAME {
                continue;
            }
            let Some(arf) = entry.path().parent() else { continue };
            if arf.file_name().and_then(|n| n.to_str()) != Some(ENCAPSULATION_DIR) {
                continue;
            }
            let Some(shorties) = arf.parent().and_then(|p| p.strip_prefix(&self.root).ok()) else {
                continue;
            };
            match self.mapper.resolve(shorties) {
                Some(id) => ids.push(id),
                None => tracing::warn!(path = %entry.path().display(), "skipping content outside the pair-tree layout"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ContentStore for FilesystemContentStore {
    fn list_identifiers(&self, offset: usize, limit: usize) -> StoreResult<Vec<Identifier>> {
        Ok(paginate(self.scan_identifiers()?, offset, limit))
    }

    fn content_exists(&self, id: &Identifier) -> StoreResult<bool> {
        Ok(self.content_path(id).is_file())
    }

    fn get_content(&self, id: &Identifier) -> StoreResult<ContentReader> {
        match File::open(self.content_path(id)) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("content for {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put_content(&self, id: &Identifier, content: &mut dyn Read) -> StoreResult<u64> {
        let path = self.content_path(id);
        if path.exists() {
            return Err(StoreError::AlreadyExists(format!("content for {id}")));
        }
        let mut staged = stage_beside(&path)?;
        let written = io::copy(content, &mut staged)?;
        staged.as_file().sync_all()?;
        match staged.persist_noclobber(&path) {
            Ok(_) => {
                tracing::debug!(%id, bytes = written, "content written");
                Ok(written)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(format!("content for {id}")))
            }
            Err(e) => Err(e.error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// PREMIS XML at `<root>/<pairtree>/arf/premis.xml`.
#[derive(Debug)]
pub struct FilesystemMetadataStore {
    root: PathBuf,
    mapper: PairtreeMapper,
}

impl FilesystemMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            root: prepare_root(root.into())?,
            mapper: PairtreeMapper::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self, id: &Identifier) -> PathBuf {
        suite_dir(&self.root, &self.mapper, id).join(METADATA_FILE_NAME)
    }
}

impl MetadataStore for FilesystemMetadataStore {
    fn metadata_exists(&self, id: &Identifier) -> StoreResult<bool> {
        Ok(self.metadata_path(id).is_file())
    }

    fn get_metadata(&self, id: &Identifier) -> StoreResult<PremisRecord> {
        let bytes = match fs::read(self.metadata_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!("metadata for {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(PremisRecord::parse(&bytes)?)
    }

    fn put_metadata(&self, id: &Identifier, record: &PremisRecord) -> StoreResult<()> {
        let path = self.metadata_path(id);
        let xml = record.to_xml()?;
        if path.exists() {
            tracing::info!(%id, "overwriting metadata record");
        }
        let mut staged = stage_beside(&path)?;
        staged.write_all(xml.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msuite_types::PremisObject;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn content_lands_in_the_pairtree() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemContentStore::new(dir.path()).unwrap();
        store.put_content(&id("doc1"), &mut &b"hello"[..]).unwrap();

        let expected = dir.path().join("do/c1/arf/content.file");
        assert_eq!(store.content_path(&id("doc1")), expected);
        assert_eq!(fs::read(expected).unwrap(), b"hello");
    }

    #[test]
    fn second_put_keeps_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemContentStore::new(dir.path()).unwrap();
        store.put_content(&id("doc1"), &mut &b"hello"[..]).unwrap();
        let err = store.put_content(&id("doc1"), &mut &b"world"[..]).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(fs::read(store.content_path(&id("doc1"))).unwrap(), b"hello");
    }

    #[test]
    fn no_staging_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemContentStore::new(dir.path()).unwrap();
        store.put_content(&id("doc1"), &mut &b"hello"[..]).unwrap();
        let arf = dir.path().join("do/c1/arf");
        let names: Vec<_> = fs::read_dir(arf)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![CONTENT_FILE_NAME.to_string()]);
    }

    #[test]
    fn nested_identifiers_are_both_listed() {
        // "ab" lives at ab/arf, "abcd" at ab/cd/arf: one is a prefix of the other.
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemContentStore::new(dir.path()).unwrap();
        for name in ["abcd", "ab", "abc"] {
            store.put_content(&id(name), &mut name.as_bytes()).unwrap();
        }
        assert_eq!(
            store.list_identifiers(0, 10).unwrap(),
            vec![id("ab"), id("abc"), id("abcd")]
        );
    }

    #[test]
    fn listing_ignores_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemContentStore::new(dir.path()).unwrap();
        store.put_content(&id("doc1"), &mut &b"x"[..]).unwrap();
        fs::create_dir_all(dir.path().join("zz/notarf")).unwrap();
        fs::write(dir.path().join("zz/notarf/content.file"), b"stray").unwrap();
        fs::write(dir.path().join("README"), b"stray").unwrap();
        assert_eq!(store.list_identifiers(0, 10).unwrap(), vec![id("doc1")]);
    }

    #[test]
    fn metadata_is_xml_on_disk_and_replaceable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemMetadataStore::new(dir.path()).unwrap();
        let rec = PremisRecord::new(PremisObject::new("local", "doc1").with_fixity("md5", "abc"));
        store.put_metadata(&id("doc1"), &rec).unwrap();

        let on_disk = fs::read_to_string(store.metadata_path(&id("doc1"))).unwrap();
        assert!(on_disk.starts_with("<?xml"));
        assert!(on_disk.contains("<objectIdentifierValue>doc1</objectIdentifierValue>"));

        let mut amended = rec.clone();
        amended.set_original_name("x.bin").unwrap();
        store.put_metadata(&id("doc1"), &amended).unwrap();
        assert_eq!(store.get_metadata(&id("doc1")).unwrap(), amended);
    }

    #[test]
    fn corrupt_metadata_is_a_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemMetadataStore::new(dir.path()).unwrap();
        let path = store.metadata_path(&id("doc1"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not xml at all <").unwrap();
        assert!(matches!(store.get_metadata(&id("doc1")), Err(StoreError::Metadata(_))));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"").unwrap();
        assert!(FilesystemContentStore::new(&file).is_err());
        assert!(FilesystemMetadataStore::new(&file).is_err());
    }

    #[test]
    fn content_and_metadata_can_share_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let content = FilesystemContentStore::new(dir.path()).unwrap();
        let metadata = FilesystemMetadataStore::new(dir.path()).unwrap();
        content.put_content(&id("doc1"), &mut &b"x"[..]).unwrap();
        metadata
            .put_metadata(&id("doc1"), &PremisRecord::new(PremisObject::new("local", "doc1")))
            .unwrap();
        assert_eq!(content.list_identifiers(0, 10).unwrap(), vec![id("doc1")]);
        assert_eq!(
            content.content_path(&id("doc1")).parent(),
            metadata.metadata_path(&id("doc1")).parent()
        );
    }
}
