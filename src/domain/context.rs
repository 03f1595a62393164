//! DomainContext: scoped CRUD for one entity kind

use super::attribution::Attribution;
use super::entity::{Entity, PARENT_FIELD};
use super::error::{DomainError, DomainResult};
use super::hierarchy;
use super::slug::slugify;
use crate::auth::AuthService;
use crate::bus::{Delivery, InvalidationBus, Signal, Subscription};
use crate::cancel::CancellationToken;
use crate::scope::{ActiveScope, ScopeResolver, TenantScope};
use crate::store::DocumentStore;
use crate::sync::{lock, BusyFlag, CollectionSync, Optimistic, Patch, SyncResult};
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Load state of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Loading,
    Ready,
    /// The last fetch failed. The cache still holds the previous contents.
    Error(String),
}

/// Something that requires a re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invalidation {
    Auth(bool),
    Collection,
    Lagged(u64),
    Scope,
}

/// Scoped access to one kind of campaign content.
///
/// Wraps a `CollectionSync` bound to the active tenant's collection and adds
/// attribution stamping, id derivation, parent validation, cascading delete
/// and change broadcast. Every successful mutation publishes
/// `CollectionChanged` for this kind; every context of the kind, the emitter
/// included, re-fetches when it processes that signal.
///
/// Signals are consumed either by calling `process_signals` or by a task
/// started with `listen`, which takes over the subscription.
pub struct DomainContext<T: Entity> {
    sync: CollectionSync<T>,
    scope: Arc<ScopeResolver>,
    auth: Arc<dyn AuthService>,
    bus: InvalidationBus,
    signals: Mutex<Option<Subscription>>,
    scope_changes: Mutex<Option<watch::Receiver<TenantScope>>>,
    state: Mutex<ContextState>,
}

impl<T: Entity> DomainContext<T> {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        scope: Arc<ScopeResolver>,
        auth: Arc<dyn AuthService>,
        bus: InvalidationBus,
        busy: BusyFlag,
    ) -> Self {
        let sync = CollectionSync::new(store, scope.collection_path(T::KIND), busy);
        let signals = bus.subscribe();
        let scope_changes = scope.subscribe();
        Self {
            sync,
            scope,
            auth,
            bus,
            signals: Mutex::new(Some(signals)),
            scope_changes: Mutex::new(Some(scope_changes)),
            state: Mutex::new(ContextState::Uninitialized),
        }
    }

    pub fn state(&self) -> ContextState {
        lock(&self.state).clone()
    }

    /// The last store error seen by this context's collection
    pub fn last_error(&self) -> Option<String> {
        self.sync.last_error()
    }

    /// Collection path the cache is bound to
    pub fn collection(&self) -> Option<String> {
        self.sync.collection()
    }

    /// Validated copies of the cached records. Empty while the scope is
    /// incomplete.
    pub fn records(&self) -> Vec<T> {
        if self.scope.collection_path(T::KIND).is_none() {
            return Vec::new();
        }
        hierarchy::validate_parents(self.sync.snapshot())
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.records().into_iter().find(|r| r.id() == id)
    }

    /// Direct children of `id`
    pub fn children(&self, id: &str) -> Vec<T> {
        let records = self.records();
        hierarchy::children(&records, id).into_iter().cloned().collect()
    }

    /// Bind to the active scope's collection and replace the cache.
    ///
    /// A fetch overtaken by a newer one is not an error; the newer fetch
    /// settles the state.
    pub async fn refresh(&self) -> DomainResult<()> {
        self.sync.retarget(self.scope.collection_path(T::KIND));
        self.set_state(ContextState::Loading);
        let result = self.sync.fetch().await;
        self.settle(result)
    }

    /// Create `draft` in the active scope.
    ///
    /// Named kinds take their id from the display name and re-read the
    /// collection first, so a name already in the store is rejected with
    /// `DuplicateId` even if this cache has not seen it; other kinds get a
    /// random id. Attribution is stamped from the signed-in identity and any
    /// parent reference that does not resolve is cleared.
    pub async fn create(&self, mut draft: T) -> DomainResult<Optimistic<String>> {
        let active = self.scope.require(self.auth.as_ref())?;
        let fresh = self.bind(&active).await?;
        // Another context may have taken this name since our last fetch
        if T::NATURAL_KEY && !fresh {
            self.refresh().await?;
        }

        let id = self.derive_id(&draft);
        if self.sync.contains(&id) {
            return Err(DomainError::DuplicateId { kind: T::KIND, id });
        }

        *draft.attribution_mut() = Attribution::created(&active.author(), Utc::now());
        if T::HIERARCHICAL {
            let cached = self.sync.snapshot();
            let parent = hierarchy::resolve_parent(&cached, &id, draft.parent_id());
            draft.set_parent_id(parent);
        }

        let outcome = self.sync.add(draft, Some(id)).await?;
        info!(kind = %T::KIND, id = %outcome.value(), "created");
        self.bus.collection_changed(T::KIND);
        Ok(outcome)
    }

    /// Apply `patch` to the record `id`. Fails with `NotFound` if the
    /// collection has no such record.
    ///
    /// Created-by fields and the id are stripped from the patch, the
    /// modified-by fields are stamped, and a parent reference is cleared if
    /// it does not resolve.
    pub async fn update(&self, id: &str, mut patch: Patch) -> DomainResult<Optimistic<()>> {
        let active = self.scope.require(self.auth.as_ref())?;
        let fresh = self.bind(&active).await?;
        self.ensure_cached(id, fresh).await?;

        Attribution::strip_created(&mut patch);
        patch.remove("id");
        if T::HIERARCHICAL {
            if let Some(requested) = patch.get(PARENT_FIELD).cloned() {
                let cached = self.sync.snapshot();
                let parent = hierarchy::resolve_parent(&cached, id, requested.as_str());
                patch.insert(PARENT_FIELD, parent.map(Value::String).unwrap_or(Value::Null));
            }
        }
        for (field, value) in Attribution::modified_patch(&active.author(), Utc::now()).into_document() {
            patch.insert(field, value);
        }

        let outcome = self.sync.update(id, patch.into_document()).await?;
        info!(kind = %T::KIND, %id, "updated");
        self.bus.collection_changed(T::KIND);
        Ok(outcome)
    }

    /// Delete `id`, and for hierarchical kinds every record below it.
    ///
    /// Descendants go first, deepest level first, and `id` itself last, all
    /// in one store batch. Returns the deleted ids in delete order. A batch
    /// that stops part-way fails with `DomainError::PartialDelete`; records
    /// that were deleted are gone from the cache.
    pub async fn delete(&self, id: &str) -> DomainResult<Optimistic<Vec<String>>> {
        let active = self.scope.require(self.auth.as_ref())?;
        let fresh = self.bind(&active).await?;
        self.ensure_cached(id, fresh).await?;

        let ids = if T::HIERARCHICAL {
            hierarchy::delete_order(&self.sync.snapshot(), id)
        } else {
            vec![id.to_string()]
        };

        if ids.len() == 1 {
            let outcome = self.sync.delete(id).await?;
            info!(kind = %T::KIND, %id, "deleted");
            self.bus.collection_changed(T::KIND);
            return Ok(outcome.map(|()| ids));
        }

        let (report, rollback) = self.sync.delete_batch(&ids).await?.into_parts();
        if !report.applied.is_empty() {
            self.bus.collection_changed(T::KIND);
        }
        if let Some(failure) = report.failed {
            return Err(DomainError::PartialDelete {
                kind: T::KIND,
                applied: report.applied,
                failed_id: failure.id,
                total: ids.len(),
                message: failure.message,
            });
        }
        info!(kind = %T::KIND, %id, descendants = ids.len() - 1, "deleted with descendants");
        Ok(Optimistic::new(report.applied, rollback))
    }

    /// Re-fetch once for every pending signal that concerns this kind and
    /// for a pending scope change. Returns the number of re-fetches.
    ///
    /// Fetch failures are reflected in `state()`.
    pub async fn process_signals(&self) -> usize {
        let pending = self.pending();
        for invalidation in &pending {
            if let Err(e) = self.apply(*invalidation).await {
                warn!(kind = %T::KIND, error = %e, "re-fetch failed");
            }
        }
        pending.len()
    }

    /// Spawn a task that re-fetches on every relevant signal until `cancel`
    /// fires, the bus or scope resolver goes away, or the context is dropped.
    ///
    /// The task takes over the context's subscription; `process_signals`
    /// sees nothing afterwards. Returns `None` if a listener already runs.
    pub fn listen(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let mut signals = lock(&self.signals).take()?;
        let mut scope_changes = lock(&self.scope_changes).take()?;
        let weak: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            debug!(kind = %T::KIND, "listener started");
            loop {
                let invalidation = tokio::select! {
                    _ = cancel.cancelled() => break,
                    delivery = signals.recv() => match delivery {
                        Some(delivery) => match Self::classify(delivery) {
                            Some(invalidation) => invalidation,
                            None => continue,
                        },
                        None => break,
                    },
                    changed = scope_changes.changed() => match changed {
                        Ok(()) => {
                            scope_changes.borrow_and_update();
                            Invalidation::Scope
                        }
                        Err(_) => break,
                    },
                };
                let Some(context) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = context.apply(invalidation).await {
                    warn!(kind = %T::KIND, error = %e, "re-fetch failed");
                }
            }
            debug!(kind = %T::KIND, "listener stopped");
        }))
    }

    fn classify(delivery: Delivery) -> Option<Invalidation> {
        match delivery {
            Delivery::Signal(Signal::AuthChanged { authenticated }) => {
                Some(Invalidation::Auth(authenticated))
            }
            Delivery::Signal(signal) if signal.concerns(T::KIND) => Some(Invalidation::Collection),
            Delivery::Signal(_) => None,
            Delivery::Lagged(missed) => Some(Invalidation::Lagged(missed)),
        }
    }

    /// Pending invalidations, in arrival order, with a scope change last.
    fn pending(&self) -> Vec<Invalidation> {
        let mut pending: Vec<Invalidation> = match lock(&self.signals).as_mut() {
            Some(signals) => signals
                .drain()
                .into_iter()
                .filter_map(Self::classify)
                .collect(),
            None => Vec::new(),
        };
        if let Some(rx) = lock(&self.scope_changes).as_mut() {
            if rx.has_changed().unwrap_or(false) {
                rx.borrow_and_update();
                pending.push(Invalidation::Scope);
            }
        }
        pending
    }

    async fn apply(&self, invalidation: Invalidation) -> DomainResult<()> {
        debug!(kind = %T::KIND, ?invalidation, "invalidated");
        match invalidation {
            Invalidation::Auth(authenticated) => {
                self.sync.retarget(self.scope.collection_path(T::KIND));
                self.set_state(ContextState::Loading);
                let result = self.sync.on_auth_changed(authenticated).await;
                self.settle(result)
            }
            Invalidation::Collection | Invalidation::Lagged(_) | Invalidation::Scope => {
                self.refresh().await
            }
        }
    }

    fn settle(&self, result: SyncResult<Vec<T>>) -> DomainResult<()> {
        match result {
            Ok(records) => {
                debug!(kind = %T::KIND, count = records.len(), "context ready");
                self.set_state(ContextState::Ready);
                Ok(())
            }
            Err(e) if e.is_superseded() => Ok(()),
            Err(e) => {
                self.set_state(ContextState::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Make sure the cache mirrors the collection a mutation will write to.
    /// Returns true if that took a fetch.
    async fn bind(&self, active: &ActiveScope) -> DomainResult<bool> {
        let path = active.collection_path(T::KIND);
        let stale = self.sync.collection().as_deref() != Some(path.as_str())
            || self.state() == ContextState::Uninitialized;
        if stale {
            self.refresh().await?;
        }
        Ok(stale)
    }

    /// Fail with `NotFound` unless `id` is cached, re-reading the collection
    /// once on a miss unless it was just read.
    async fn ensure_cached(&self, id: &str, fresh: bool) -> DomainResult<()> {
        if self.sync.contains(id) {
            return Ok(());
        }
        if !fresh {
            self.refresh().await?;
            if self.sync.contains(id) {
                return Ok(());
            }
        }
        Err(DomainError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    fn derive_id(&self, draft: &T) -> String {
        if T::NATURAL_KEY {
            let slug = slugify(draft.display_name());
            if !slug.is_empty() {
                return slug;
            }
        }
        Uuid::new_v4().to_string()
    }

    fn set_state(&self, state: ContextState) {
        *lock(&self.state) = state;
    }
}
