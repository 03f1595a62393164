//! Cached record contract and document conversion

use crate::store::{into_document, Document, StoreError, StoredDocument};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Anything a `CollectionSync` can cache.
///
/// The id is the document key. It is serialized under `"id"` but never
/// written into the stored document body.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

/// Serialize a record into a document body (without its id)
pub fn encode<T: Record>(record: &T) -> Result<Document, StoreError> {
    let mut doc = into_document(serde_json::to_value(record)?)?;
    doc.remove("id");
    Ok(doc)
}

/// Rebuild a record from a stored document, taking the id from the key
pub fn decode<T: Record>(doc: StoredDocument) -> Result<T, serde_json::Error> {
    let StoredDocument { id, mut data } = doc;
    data.insert("id".to_string(), Value::String(id));
    serde_json::from_value(Value::Object(data))
}
