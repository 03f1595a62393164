//! In-process document store

use super::traits::{
    merge_document, Document, DocumentStore, StoreError, StoreResult, StoredDocument,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// A document store held entirely in memory.
///
/// Collections are created on first write. Documents within a collection are
/// returned in id order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, BTreeMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Read one document directly, bypassing any cache
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_collection(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_document(&self, collection: &str, id: &str, value: Document) -> StoreResult<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<()> {
        let mut docs = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let doc = docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        merge_document(doc, &partial);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        if let Some(mut docs) = self.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::traits::into_document;
    use serde_json::json;

    const LOCATIONS: &str = "groups/g1/campaigns/c1/locations";

    fn doc(value: serde_json::Value) -> Document {
        into_document(value).unwrap()
    }

    #[tokio::test]
    async fn set_then_get_collection() {
        let store = MemoryStore::new();
        store
            .set_document(LOCATIONS, "erebor", doc(json!({"name": "Erebor"})))
            .await
            .unwrap();

        let docs = store.get_collection(LOCATIONS).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "erebor");
        assert_eq!(docs[0].data["name"], json!("Erebor"));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        store
            .set_document(LOCATIONS, "erebor", doc(json!({"name": "Erebor"})))
            .await
            .unwrap();

        let other = store
            .get_collection("groups/g1/campaigns/c2/locations")
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_document(LOCATIONS, "nowhere", doc(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::new();
        store
            .set_document(LOCATIONS, "erebor", doc(json!({"name": "Erebor", "description": ""})))
            .await
            .unwrap();
        store
            .update_document(LOCATIONS, "erebor", doc(json!({"description": "Lonely Mountain"})))
            .await
            .unwrap();

        let stored = store.document(LOCATIONS, "erebor").unwrap();
        assert_eq!(stored["name"], json!("Erebor"));
        assert_eq!(stored["description"], json!("Lonely Mountain"));
    }

    #[tokio::test]
    async fn default_batch_delete_applies_in_order() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.set_document(LOCATIONS, id, Document::new()).await.unwrap();
        }

        let report = store
            .delete_documents(LOCATIONS, &["b".to_string(), "a".to_string()])
            .await;

        assert!(report.is_complete());
        assert_eq!(report.applied, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(store.len(LOCATIONS), 1);
    }
}
