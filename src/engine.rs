//! ChronicleEngine: wires the collaborators together and mounts contexts

use crate::auth::{AuthService, LocalAuth};
use crate::bus::InvalidationBus;
use crate::cancel::CancellationToken;
use crate::config::ChronicleConfig;
use crate::domain::{Chapter, DomainContext, Entity, Location, Note, Npc, Quest, Rumor};
use crate::scope::ScopeResolver;
use crate::session::{ActivityKind, SessionManager};
use crate::store::DocumentStore;
use crate::sync::BusyFlag;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One store, one auth collaborator, one scope resolver, one bus and one
/// busy flag, shared by every context mounted from this engine.
#[derive(Clone)]
pub struct ChronicleEngine {
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthService>,
    scope: Arc<ScopeResolver>,
    bus: InvalidationBus,
    busy: BusyFlag,
    config: ChronicleConfig,
}

impl ChronicleEngine {
    /// `bus` must be the bus `auth` publishes its sign-in and sign-out
    /// signals on.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthService>,
        bus: InvalidationBus,
        config: ChronicleConfig,
    ) -> Self {
        Self {
            store,
            auth,
            scope: Arc::new(ScopeResolver::new()),
            bus,
            busy: BusyFlag::new(),
            config,
        }
    }

    /// An engine backed by `LocalAuth`, returned alongside so callers can
    /// sign in.
    pub fn with_local_auth(store: Arc<dyn DocumentStore>, config: ChronicleConfig) -> (Self, Arc<LocalAuth>) {
        let bus = InvalidationBus::new(config.bus.capacity);
        let auth = Arc::new(LocalAuth::new(bus.clone(), config.session.expiry_window()));
        let engine = Self::new(store, auth.clone(), bus, config);
        (engine, auth)
    }

    pub fn scope(&self) -> &Arc<ScopeResolver> {
        &self.scope
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.auth
    }

    /// True while any store operation from any context is in flight
    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    pub fn config(&self) -> &ChronicleConfig {
        &self.config
    }

    /// Mount a new context for `T`. Each call returns an independent
    /// context with its own cache and subscription.
    pub fn context<T: Entity>(&self) -> Arc<DomainContext<T>> {
        Arc::new(DomainContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.scope),
            Arc::clone(&self.auth),
            self.bus.clone(),
            self.busy.clone(),
        ))
    }

    pub fn locations(&self) -> Arc<DomainContext<Location>> {
        self.context()
    }

    pub fn chapters(&self) -> Arc<DomainContext<Chapter>> {
        self.context()
    }

    pub fn notes(&self) -> Arc<DomainContext<Note>> {
        self.context()
    }

    pub fn npcs(&self) -> Arc<DomainContext<Npc>> {
        self.context()
    }

    pub fn quests(&self) -> Arc<DomainContext<Quest>> {
        self.context()
    }

    pub fn rumors(&self) -> Arc<DomainContext<Rumor>> {
        self.context()
    }

    pub fn session_manager(&self) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(Arc::clone(&self.auth), &self.config.session))
    }

    /// Start a session manager fed by `activity`. The bus subscription is
    /// taken before the task starts, so no auth signal is missed.
    pub fn spawn_session(
        &self,
        activity: mpsc::Receiver<ActivityKind>,
        cancel: CancellationToken,
    ) -> (Arc<SessionManager>, JoinHandle<()>) {
        let manager = self.session_manager();
        let handle = manager.spawn(activity, self.bus.subscribe(), cancel);
        (manager, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::scope::TenantScope;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn contexts_share_bus_and_scope() {
        let (engine, auth) = ChronicleEngine::with_local_auth(Arc::new(MemoryStore::new()), ChronicleConfig::default());
        auth.sign_in(Identity::new("u1", "bilbo"));
        engine.scope().set_scope(TenantScope::new("g1", "c1"));

        let a = engine.locations();
        let b = engine.locations();
        a.create(Location::new("Erebor")).await.unwrap();

        assert_eq!(b.process_signals().await, 1);
        assert!(b.get("erebor").is_some());
        assert!(!engine.busy().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_session_signs_out_after_idle_window() {
        let mut config = ChronicleConfig::default();
        config.session.expiry_window_ms = 10_000;
        config.session.poll_interval_ms = 1_000;
        let (engine, auth) = ChronicleEngine::with_local_auth(Arc::new(MemoryStore::new()), config);
        auth.sign_in(Identity::new("u1", "bilbo"));

        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (manager, handle) = engine.spawn_session(rx, cancel.clone());

        tokio::time::sleep(std::time::Duration::from_secs(12)).await;
        assert!(auth.current_identity().is_none());
        assert!(!manager.is_attached());

        cancel.cancel();
        handle.await.unwrap();
    }
}
