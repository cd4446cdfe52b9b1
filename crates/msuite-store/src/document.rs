use std::fmt;
use std::sync::Arc;

use msuite_types::{Identifier, PremisRecord};
use serde_json::{json, Value};

use crate::error::{StoreError, StoreResult};
use crate::escape::{escape_keys, unescape_keys};
use crate::traits::MetadataStore;

/// Field of a metadata document that holds the escaped PREMIS tree.
pub const METADATA_FIELD: &str = "premis_json";

/// A collection of JSON documents keyed by `_id`.
///
/// This is the client seam for document databases: one long-lived
/// collection handle is created at startup and shared by reference.
pub trait DocumentCollection: Send + Sync {
    fn find_one(&self, id: &str) -> StoreResult<Option<Value>>;

    /// Insert `document`, replacing any document with the same id.
    ///
    /// Returns `true` if an existing document was replaced.
    fn upsert_one(&self, id: &str, document: Value) -> StoreResult<bool>;

    fn contains(&self, id: &str) -> StoreResult<bool> {
        Ok(self.find_one(id)?.is_some())
    }

    /// One page of document ids in ascending order.
    fn ids(&self, offset: usize, limit: usize) -> StoreResult<Vec<String>>;
}

/// Metadata strategy storing each record as
/// `{ "_id": <identifier>, "premis_json": <escaped structural form> }`.
///
/// The structural form is the record's element tree (see
/// [`PremisRecord::to_json`]), so the stored document holds everything the
/// XML did.
pub struct DocumentMetadataStore {
    collection: Arc<dyn DocumentCollection>,
}

impl DocumentMetadataStore {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self { collection }
    }
}

impl MetadataStore for DocumentMetadataStore {
    fn metadata_exists(&self, id: &Identifier) -> StoreResult<bool> {
        self.collection.contains(id.as_str())
    }

    fn get_metadata(&self, id: &Identifier) -> StoreResult<PremisRecord> {
        let document = self
            .collection
            .find_one(id.as_str())?
            .ok_or_else(|| StoreError::NotFound(format!("metadata for {id}")))?;
        let Some(tree) = document.get(METADATA_FIELD) else {
            return Err(StoreError::Backend(format!(
                "metadata document for {id} has no {METADATA_FIELD} field"
            )));
        };
        tracing::debug!(%id, "metadata document found");
        Ok(PremisRecord::from_json(unescape_keys(tree.clone()))?)
    }

    fn put_metadata(&self, id: &Identifier, record: &PremisRecord) -> StoreResult<()> {
        let document = json!({
            "_id": id.as_str(),
            METADATA_FIELD: escape_keys(record.to_json()?),
        });
        if self.collection.upsert_one(id.as_str(), document)? {
            tracing::info!(%id, "overwrote metadata record");
        }
        Ok(())
    }
}

impl fmt::Debug for DocumentMetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentMetadataStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentCollection;
    use msuite_types::PremisObject;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn stores_escaped_document_shape() {
        let collection = Arc::new(InMemoryDocumentCollection::new());
        let store = DocumentMetadataStore::new(collection.clone());
        let rec = PremisRecord::new(PremisObject::new("local", "doc1").with_fixity("md5", "abc"));
        store.put_metadata(&id("doc1"), &rec).unwrap();

        let doc = collection.find_one("doc1").unwrap().unwrap();
        assert_eq!(doc["_id"], "doc1");
        let tree = &doc[METADATA_FIELD];
        assert_eq!(tree["name"], "premis");
        assert_eq!(tree["children"][0]["name"], "object");
        assert_eq!(store.get_metadata(&id("doc1")).unwrap(), rec);
    }

    #[test]
    fn keys_needing_escape_survive_storage() {
        let collection = Arc::new(InMemoryDocumentCollection::new());
        let store = DocumentMetadataStore::new(collection.clone());
        let xml = r#"<premis xmlns="http://www.loc.gov/premis/v3" version="3.0" ext.note="kept">
              <object>
                <objectIdentifier>
                  <objectIdentifierType>local</objectIdentifierType>
                  <objectIdentifierValue>doc1</objectIdentifierValue>
                </objectIdentifier>
              </object>
            </premis>"#;
        let rec = PremisRecord::parse(xml.as_bytes()).unwrap();
        store.put_metadata(&id("doc1"), &rec).unwrap();

        let raw = collection.find_one("doc1").unwrap().unwrap();
        let attributes = &raw[METADATA_FIELD]["attributes"];
        assert_eq!(attributes["ext~pnote"], "kept");
        assert!(attributes.get("ext.note").is_none());
        let back = store.get_metadata(&id("doc1")).unwrap();
        assert_eq!(back.root().attributes["ext.note"], "kept");
        assert_eq!(back, rec);
    }

    #[test]
    fn document_without_metadata_field_is_a_backend_error() {
        let collection = Arc::new(InMemoryDocumentCollection::new());
        collection.upsert_one("doc1", json!({"_id": "doc1"})).unwrap();
        let store = DocumentMetadataStore::new(collection);
        assert!(matches!(store.get_metadata(&id("doc1")), Err(StoreError::Backend(_))));
    }

    #[test]
    fn overwrite_replaces_document() {
        let collection = Arc::new(InMemoryDocumentCollection::new());
        let store = DocumentMetadataStore::new(collection.clone());
        let first = PremisRecord::new(PremisObject::new("local", "doc1"));
        let mut second = first.clone();
        second.set_original_name("b").unwrap();
        store.put_metadata(&id("doc1"), &first).unwrap();
        store.put_metadata(&id("doc1"), &second).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(store.get_metadata(&id("doc1")).unwrap(), second);
    }
}
