//! Common test utilities for Chronicle integration tests
//!
//! Spy collaborators that record what the core asks of them and can be told
//! to fail or to stall.

#![allow(dead_code)]

use async_trait::async_trait;
use chronicle::store::{Document, DocumentStore, MemoryStore, StoreError, StoreResult, StoredDocument};
use chronicle::{AuthResult, AuthService, Identity, LocalAuth};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One call made against a `SpyStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get { collection: String },
    Set { collection: String, id: String },
    Update { collection: String, id: String },
    Delete { collection: String, id: String },
}

/// A `MemoryStore` that records every call.
///
/// Reads can be failed wholesale or held until released; deletes can be
/// failed for one id.
#[derive(Default)]
pub struct SpyStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    fail_reads: AtomicBool,
    fail_delete_of: Mutex<Option<String>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
}

impl SpyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Ids deleted, in call order
    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn reads_of(&self, collection: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StoreCall::Get { collection: c } if c == collection))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_reads(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, id: Option<&str>) {
        *self.fail_delete_of.lock().unwrap() = id.map(str::to_string);
    }

    /// Make reads of `collection` stall until the returned handle is
    /// notified. The read captures the collection contents before stalling.
    pub fn hold(&self, collection: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap()
            .insert(collection.to_string(), Arc::clone(&notify));
        notify
    }

    /// Write a raw document without recording a call
    pub async fn seed(&self, collection: &str, id: &str, value: Value) {
        let Value::Object(doc) = value else {
            panic!("seed documents must be objects");
        };
        self.inner.set_document(collection, id, doc).await.unwrap();
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.inner.document(collection, id)
    }

    pub fn len(&self, collection: &str) -> usize {
        self.inner.len(collection)
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DocumentStore for SpyStore {
    async fn get_collection(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        self.record(StoreCall::Get {
            collection: collection.to_string(),
        });
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("read refused".into()));
        }
        let docs = self.inner.get_collection(collection).await?;
        let hold = self.holds.lock().unwrap().remove(collection);
        if let Some(hold) = hold {
            hold.notified().await;
        }
        Ok(docs)
    }

    async fn set_document(&self, collection: &str, id: &str, value: Document) -> StoreResult<()> {
        self.record(StoreCall::Set {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self.inner.set_document(collection, id, value).await
    }

    async fn update_document(&self, collection: &str, id: &str, partial: Document) -> StoreResult<()> {
        self.record(StoreCall::Update {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self.inner.update_document(collection, id, partial).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.record(StoreCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        if self.fail_delete_of.lock().unwrap().as_deref() == Some(id) {
            return Err(StoreError::PermissionDenied(format!("cannot delete {id}")));
        }
        self.inner.delete_document(collection, id).await
    }
}

/// `LocalAuth` with call counters.
pub struct SpyAuth {
    pub inner: LocalAuth,
    pub refreshes: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl SpyAuth {
    pub fn new(inner: LocalAuth) -> Self {
        Self {
            inner,
            refreshes: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        self.inner.sign_in(identity);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthService for SpyAuth {
    fn current_identity(&self) -> Option<Identity> {
        self.inner.current_identity()
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_out().await
    }

    async fn refresh_session(&self) -> AuthResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh_session().await
    }

    fn session_expired(&self) -> bool {
        self.inner.session_expired()
    }
}

pub fn bilbo() -> Identity {
    Identity::new("u1", "bilbo")
}

pub const LOCATIONS: &str = "groups/g1/campaigns/c1/locations";
pub const NOTES: &str = "groups/g1/campaigns/c1/notes";
