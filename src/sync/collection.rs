//! CollectionSync: a local cache over one remote collection

use super::busy::BusyFlag;
use super::error::{SyncError, SyncResult};
use super::lock;
use super::optimistic::{Optimistic, Rollback};
use super::record::{decode, encode, Record};
use crate::store::{merge_document, BatchDelete, Document, DocumentStore, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// The state of one cache entry before a mutation touched it.
struct Prior<T> {
    id: String,
    previous: Option<(usize, T)>,
}

/// A cache over one remote collection.
///
/// - `fetch` replaces the whole cache with the store contents
/// - `add`, `update`, `delete` write through first and touch the cache only
///   after the store acknowledges
/// - every fetch carries a generation; a response that arrives after a
///   newer fetch, a retarget or a sign-out is discarded
///
/// The collection path is `None` while no tenant scope is bound. Reads then
/// return nothing and writes fail with `SyncError::Unscoped`.
pub struct CollectionSync<T: Record> {
    store: Arc<dyn DocumentStore>,
    collection: RwLock<Option<String>>,
    cache: Arc<Mutex<Vec<T>>>,
    error: Mutex<Option<String>>,
    generation: AtomicU64,
    busy: BusyFlag,
}

impl<T: Record> CollectionSync<T> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: Option<String>, busy: BusyFlag) -> Self {
        Self {
            store,
            collection: RwLock::new(collection),
            cache: Arc::new(Mutex::new(Vec::new())),
            error: Mutex::new(None),
            generation: AtomicU64::new(0),
            busy,
        }
    }

    /// The collection path currently bound, if any
    pub fn collection(&self) -> Option<String> {
        self.collection
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Point the cache at another collection.
    ///
    /// In-flight fetches for the old path are discarded when they land. The
    /// cache keeps its contents until the next fetch.
    pub fn retarget(&self, collection: Option<String>) {
        let mut current = self
            .collection
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *current != collection {
            debug!(from = ?*current, to = ?collection, "retargeting collection");
            *current = collection;
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Copy of the cached records, in cache order
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.cache).clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        lock(&self.cache).iter().find(|r| r.id() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.cache).iter().any(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        lock(&self.cache).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last error recorded for this collection, cleared by the next
    /// successful operation
    pub fn last_error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    /// Drop every cached record and discard in-flight fetches
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        lock(&self.cache).clear();
    }

    /// Replace the cache with the store contents.
    ///
    /// On failure the error is recorded and returned and the cache keeps its
    /// prior contents. Documents that do not decode are skipped.
    pub async fn fetch(&self) -> SyncResult<Vec<T>> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let Some(collection) = self.collection() else {
            self.apply_fetch(generation, Vec::new())?;
            return Ok(Vec::new());
        };

        let _busy = self.busy.enter();
        debug!(%collection, generation, "fetching collection");
        let docs = match self.store.get_collection(&collection).await {
            Ok(docs) => docs,
            Err(e) => {
                if !self.is_current(generation) {
                    return Err(SyncError::Superseded);
                }
                warn!(%collection, error = %e, "fetch failed");
                *lock(&self.error) = Some(e.to_string());
                return Err(e.into());
            }
        };

        let records: Vec<T> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match decode::<T>(doc) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(%collection, %id, error = %e, "skipping undecodable document");
                        None
                    }
                }
            })
            .collect();

        self.apply_fetch(generation, records.clone())?;
        *lock(&self.error) = None;
        debug!(%collection, count = records.len(), "collection fetched");
        Ok(records)
    }

    /// React to a sign-in or sign-out: a sign-out empties the cache at once,
    /// and both directions re-fetch.
    pub async fn on_auth_changed(&self, authenticated: bool) -> SyncResult<Vec<T>> {
        if !authenticated {
            self.clear();
        }
        self.fetch().await
    }

    /// Write `record` to the store, then cache it.
    ///
    /// The id is `id` if given, else the record's own id if non-empty, else a
    /// random UUID. A cached record with the same id is replaced.
    pub async fn add(&self, mut record: T, id: Option<String>) -> SyncResult<Optimistic<String>> {
        let collection = self.require_collection()?;
        let id = id
            .filter(|id| !id.is_empty())
            .or_else(|| Some(record.id().to_string()).filter(|id| !id.is_empty()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        record.set_id(id.clone());
        let body = encode(&record)?;

        {
            let _busy = self.busy.enter();
            let result = self.store.set_document(&collection, &id, body).await;
            self.track(result)?;
        }

        let prior = {
            let mut cache = lock(&self.cache);
            match cache.iter().position(|r| r.id() == id) {
                Some(index) => {
                    let previous = std::mem::replace(&mut cache[index], record);
                    Prior {
                        id: id.clone(),
                        previous: Some((index, previous)),
                    }
                }
                None => {
                    cache.push(record);
                    Prior {
                        id: id.clone(),
                        previous: None,
                    }
                }
            }
        };
        debug!(%collection, %id, "record added");
        Ok(Optimistic::new(id, self.restore(vec![prior])))
    }

    /// Write `partial` to the store, then merge it into the cached record.
    ///
    /// The cache is untouched when no cached record has this id.
    pub async fn update(&self, id: &str, partial: Document) -> SyncResult<Optimistic<()>> {
        let collection = self.require_collection()?;

        {
            let _busy = self.busy.enter();
            let result = self
                .store
                .update_document(&collection, id, partial.clone())
                .await;
            self.track(result)?;
        }

        let prior = {
            let mut cache = lock(&self.cache);
            let Some(index) = cache.iter().position(|r| r.id() == id) else {
                debug!(%collection, %id, "updated record not cached");
                return Ok(Optimistic::new((), Rollback::noop()));
            };
            match Self::merged(&cache[index], &partial) {
                Ok(merged) => {
                    let previous = std::mem::replace(&mut cache[index], merged);
                    Prior {
                        id: id.to_string(),
                        previous: Some((index, previous)),
                    }
                }
                Err(e) => {
                    warn!(%collection, %id, error = %e, "cached record no longer decodes after merge");
                    return Ok(Optimistic::new((), Rollback::noop()));
                }
            }
        };
        debug!(%collection, %id, "record updated");
        Ok(Optimistic::new((), self.restore(vec![prior])))
    }

    /// Delete from the store, then from the cache.
    pub async fn delete(&self, id: &str) -> SyncResult<Optimistic<()>> {
        let collection = self.require_collection()?;

        {
            let _busy = self.busy.enter();
            let result = self.store.delete_document(&collection, id).await;
            self.track(result)?;
        }

        let priors = self.remove_cached(&[id.to_string()]);
        debug!(%collection, %id, "record deleted");
        Ok(Optimistic::new((), self.restore(priors)))
    }

    /// Delete several records in order with one store batch, then filter
    /// every applied id out of the cache in one pass.
    ///
    /// A partially applied batch is not an error here; the report says what
    /// was applied and the failure is recorded in the error slot.
    pub async fn delete_batch(&self, ids: &[String]) -> SyncResult<Optimistic<BatchDelete>> {
        let collection = self.require_collection()?;

        let report = {
            let _busy = self.busy.enter();
            self.store.delete_documents(&collection, ids).await
        };
        match &report.failed {
            Some(failure) => {
                warn!(
                    %collection,
                    applied = report.applied.len(),
                    failed_id = %failure.id,
                    error = %failure.message,
                    "batch delete partially applied"
                );
                *lock(&self.error) = Some(failure.message.clone());
            }
            None => *lock(&self.error) = None,
        }

        let priors = self.remove_cached(&report.applied);
        debug!(%collection, count = report.applied.len(), "records deleted");
        Ok(Optimistic::new(report, self.restore(priors)))
    }

    fn require_collection(&self) -> SyncResult<String> {
        self.collection().ok_or(SyncError::Unscoped)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Install fetched records unless a newer generation exists.
    fn apply_fetch(&self, generation: u64, records: Vec<T>) -> SyncResult<()> {
        let mut cache = lock(&self.cache);
        if !self.is_current(generation) {
            debug!(generation, "discarding superseded fetch");
            return Err(SyncError::Superseded);
        }
        *cache = records;
        Ok(())
    }

    fn track<R>(&self, result: StoreResult<R>) -> SyncResult<R> {
        match result {
            Ok(value) => {
                *lock(&self.error) = None;
                Ok(value)
            }
            Err(e) => {
                warn!(collection = ?self.collection(), error = %e, "store write failed");
                *lock(&self.error) = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    fn merged(record: &T, partial: &Document) -> Result<T, serde_json::Error> {
        let mut doc = match serde_json::to_value(record)? {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        };
        merge_document(&mut doc, partial);
        doc.insert(
            "id".to_string(),
            serde_json::Value::String(record.id().to_string()),
        );
        serde_json::from_value(serde_json::Value::Object(doc))
    }

    fn remove_cached(&self, ids: &[String]) -> Vec<Prior<T>> {
        let mut cache = lock(&self.cache);
        let mut priors = Vec::new();
        let mut index = 0;
        cache.retain(|record| {
            let keep = !ids.iter().any(|id| id == record.id());
            if !keep {
                priors.push(Prior {
                    id: record.id().to_string(),
                    previous: Some((index, record.clone())),
                });
            }
            index += 1;
            keep
        });
        priors
    }

    /// Build a rollback that puts every entry in `priors` back the way it
    /// was: the current entry for each id is removed, then previous entries
    /// are reinserted at their old positions.
    fn restore(&self, priors: Vec<Prior<T>>) -> Rollback {
        if priors.is_empty() {
            return Rollback::noop();
        }
        let cache = Arc::clone(&self.cache);
        Rollback::new(move || {
            let mut cache = lock(&cache);
            cache.retain(|record| !priors.iter().any(|p| p.id == record.id()));
            let mut previous: Vec<(usize, T)> =
                priors.into_iter().filter_map(|p| p.previous).collect();
            previous.sort_by_key(|(index, _)| *index);
            for (index, record) in previous {
                let at = index.min(cache.len());
                cache.insert(at, record);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{into_document, MemoryStore, StoreError, StoredDocument};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::AtomicBool;

    const PATH: &str = "groups/g1/campaigns/c1/notes";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        #[serde(default)]
        id: String,
        title: String,
        #[serde(default)]
        done: bool,
    }

    impl Record for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn item(title: &str) -> Item {
        Item {
            id: String::new(),
            title: title.to_string(),
            done: false,
        }
    }

    /// Store wrapper that can be switched to fail every call.
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                failing: AtomicBool::new(false),
            }
        }

        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> StoreResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StoreError::Transport("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get_collection(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
            self.check()?;
            self.inner.get_collection(collection).await
        }

        async fn set_document(&self, collection: &str, id: &str, value: Document) -> StoreResult<()> {
            self.check()?;
            self.inner.set_document(collection, id, value).await
        }

        async fn update_document(&self, collection: &str, id: &str, partial: Document) -> StoreResult<()> {
            self.check()?;
            self.inner.update_document(collection, id, partial).await
        }

        async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
            self.check()?;
            self.inner.delete_document(collection, id).await
        }
    }

    fn sync_over(store: Arc<dyn DocumentStore>) -> CollectionSync<Item> {
        CollectionSync::new(store, Some(PATH.to_string()), BusyFlag::new())
    }

    #[tokio::test]
    async fn add_then_fetch_yields_one_equal_record() {
        let sync = sync_over(Arc::new(MemoryStore::new()));

        let id = sync.add(item("Session zero"), Some("s0".into())).await.unwrap().into_value();
        let cached = sync.get(&id).unwrap();
        let fetched = sync.fetch().await.unwrap();

        assert_eq!(fetched, vec![cached]);
        assert_eq!(sync.len(), 1);
    }

    #[tokio::test]
    async fn add_generates_id_when_none_given() {
        let sync = sync_over(Arc::new(MemoryStore::new()));
        let id = sync.add(item("Untitled"), None).await.unwrap().into_value();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(sync.get(&id).unwrap().id, id);
    }

    #[tokio::test]
    async fn add_with_existing_id_replaces_cached_entry() {
        let sync = sync_over(Arc::new(MemoryStore::new()));
        sync.add(item("First"), Some("n".into())).await.unwrap();
        sync.add(item("Second"), Some("n".into())).await.unwrap();

        assert_eq!(sync.len(), 1);
        assert_eq!(sync.get("n").unwrap().title, "Second");
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let store = Arc::new(FlakyStore::new());
        let sync = sync_over(store.clone());
        sync.add(item("Kept"), Some("kept".into())).await.unwrap();

        store.fail(true);
        let err = sync.add(item("Lost"), Some("lost".into())).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Transport(_))));
        assert!(sync.update("kept", into_document(json!({"title": "x"})).unwrap()).await.is_err());
        assert!(sync.delete("kept").await.is_err());

        assert_eq!(sync.snapshot().len(), 1);
        assert_eq!(sync.get("kept").unwrap().title, "Kept");
        assert!(sync.last_error().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_prior_cache_and_records_error() {
        let store = Arc::new(FlakyStore::new());
        let sync = sync_over(store.clone());
        sync.add(item("Kept"), Some("kept".into())).await.unwrap();

        store.fail(true);
        assert!(sync.fetch().await.is_err());
        assert_eq!(sync.len(), 1);
        assert!(sync.last_error().is_some());

        store.fail(false);
        sync.fetch().await.unwrap();
        assert!(sync.last_error().is_none());
    }

    #[tokio::test]
    async fn update_merges_into_cached_record() {
        let sync = sync_over(Arc::new(MemoryStore::new()));
        sync.add(item("Errand"), Some("e".into())).await.unwrap();

        sync.update("e", into_document(json!({"done": true})).unwrap())
            .await
            .unwrap();

        let cached = sync.get("e").unwrap();
        assert!(cached.done);
        assert_eq!(cached.title, "Errand");
    }

    #[tokio::test]
    async fn update_of_uncached_record_is_local_noop() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_document(PATH, "remote", into_document(json!({"title": "Remote"})).unwrap())
            .await
            .unwrap();
        let sync = sync_over(store.clone());

        sync.update("remote", into_document(json!({"done": true})).unwrap())
            .await
            .unwrap();

        assert!(sync.is_empty());
        assert_eq!(store.document(PATH, "remote").unwrap()["done"], json!(true));
    }

    #[tokio::test]
    async fn rollback_restores_previous_entries() {
        let sync = sync_over(Arc::new(MemoryStore::new()));
        for (id, title) in [("a", "A"), ("b", "B"), ("c", "C")] {
            sync.add(item(title), Some(id.into())).await.unwrap();
        }

        sync.delete("b").await.unwrap().rollback();
        let ids: Vec<_> = sync.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        sync.update("a", into_document(json!({"title": "A2"})).unwrap())
            .await
            .unwrap()
            .rollback();
        assert_eq!(sync.get("a").unwrap().title, "A");

        sync.add(item("D"), Some("d".into())).await.unwrap().rollback();
        assert!(!sync.contains("d"));
    }

    #[tokio::test]
    async fn delete_batch_filters_applied_ids() {
        let sync = sync_over(Arc::new(MemoryStore::new()));
        for id in ["a", "b", "c"] {
            sync.add(item(id), Some(id.into())).await.unwrap();
        }

        let report = sync
            .delete_batch(&["c".to_string(), "a".to_string()])
            .await
            .unwrap()
            .into_value();

        assert!(report.is_complete());
        let ids: Vec<_> = sync.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn unscoped_sync_reads_empty_and_refuses_writes() {
        let sync: CollectionSync<Item> =
            CollectionSync::new(Arc::new(MemoryStore::new()), None, BusyFlag::new());

        assert!(sync.fetch().await.unwrap().is_empty());
        assert!(matches!(
            sync.add(item("x"), None).await,
            Err(SyncError::Unscoped)
        ));
    }

    #[tokio::test]
    async fn sign_out_clears_then_refetches() {
        let store = Arc::new(MemoryStore::new());
        let sync = sync_over(store.clone());
        sync.add(item("A"), Some("a".into())).await.unwrap();
        store.delete_document(PATH, "a").await.unwrap();

        let refetched = sync.on_auth_changed(false).await.unwrap();
        assert!(refetched.is_empty());
        assert!(sync.is_empty());

        store
            .set_document(PATH, "b", into_document(json!({"title": "B"})).unwrap())
            .await
            .unwrap();
        sync.on_auth_changed(true).await.unwrap();
        assert!(sync.contains("b"));
    }

    #[tokio::test]
    async fn undecodable_documents_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_document(PATH, "good", into_document(json!({"title": "ok"})).unwrap())
            .await
            .unwrap();
        store
            .set_document(PATH, "bad", into_document(json!({"title": 42})).unwrap())
            .await
            .unwrap();
        let sync = sync_over(store);

        let fetched = sync.fetch().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "good");
    }

    #[tokio::test]
    async fn busy_flag_is_released_after_operations() {
        let busy = BusyFlag::new();
        let sync: CollectionSync<Item> =
            CollectionSync::new(Arc::new(MemoryStore::new()), Some(PATH.into()), busy.clone());
        sync.add(item("x"), None).await.unwrap();
        sync.fetch().await.unwrap();
        assert!(!busy.is_busy());
    }
}
