//! Chronicle: tenant-scoped collection sync for campaign content
//!
//! Mirrors remote, tenant-scoped document collections into local caches,
//! stamps attribution on every write, cascades deletes through location
//! hierarchies, and keeps independent caches fresh through a process-wide
//! invalidation bus. A session manager keeps the sign-in alive while the
//! user is active and ends it after an idle window.
//!
//! # Core Concepts
//!
//! - **Store**: the remote document store, behind `DocumentStore`
//! - **Scope**: the active `(group, campaign)` pair that partitions content
//! - **Context**: scoped CRUD for one entity kind over a synced cache
//! - **Bus**: invalidation signals that make contexts re-fetch
//!
//! # Example
//!
//! ```
//! use chronicle::{ChronicleConfig, ChronicleEngine, MemoryStore};
//! use std::sync::Arc;
//!
//! let (engine, _auth) =
//!     ChronicleEngine::with_local_auth(Arc::new(MemoryStore::new()), ChronicleConfig::default());
//! let locations = engine.locations();
//! // No scope yet, so reads are empty
//! assert!(locations.records().is_empty());
//! ```

pub mod auth;
pub mod bus;
pub mod cancel;
pub mod config;
pub mod domain;
mod engine;
pub mod scope;
pub mod session;
pub mod store;
pub mod sync;

pub use auth::{AuthError, AuthResult, AuthService, Identity, LocalAuth};
pub use bus::{Delivery, InvalidationBus, Signal, Subscription};
pub use cancel::CancellationToken;
pub use config::{ChronicleConfig, ConfigError};
pub use domain::{
    Attribution, Chapter, ContextState, DomainContext, DomainError, DomainResult, Entity,
    EntityKind, Location, Note, Npc, Quest, QuestStatus, Rumor,
};
pub use engine::ChronicleEngine;
pub use scope::{ScopeError, ScopeResolver, TenantScope};
pub use session::{ActivityKind, SessionManager};
pub use store::{DocumentStore, MemoryStore, OpenStore, SqliteStore, StoreError, StoreResult};
pub use sync::{CollectionSync, Optimistic, Patch, SyncError};
