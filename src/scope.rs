//! Tenant scope resolution
//!
//! Every content collection is partitioned by a `(group, campaign)` pair.
//! `ScopeResolver` holds the active pair, publishes changes on a watch
//! channel, and turns the pair plus the signed-in identity into an
//! `ActiveScope` that mutations require.

use crate::auth::{AuthService, Identity};
use crate::domain::{Author, EntityKind};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("no active group selected")]
    MissingGroup,

    #[error("no active campaign selected")]
    MissingCampaign,
}

pub type ScopeResult<T> = Result<T, ScopeError>;

/// The active `(group, campaign)` pair. Either half may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantScope {
    pub active_group_id: Option<String>,
    pub active_campaign_id: Option<String>,
}

impl TenantScope {
    pub fn new(group_id: impl Into<String>, campaign_id: impl Into<String>) -> Self {
        Self {
            active_group_id: Some(group_id.into()),
            active_campaign_id: Some(campaign_id.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.active_group_id.is_some() && self.active_campaign_id.is_some()
    }

    /// Store path of `kind`'s collection, or `None` while the scope is incomplete
    pub fn collection_path(&self, kind: EntityKind) -> Option<String> {
        match (&self.active_group_id, &self.active_campaign_id) {
            (Some(group), Some(campaign)) => Some(collection_path(group, campaign, kind)),
            _ => None,
        }
    }
}

/// `groups/{group}/campaigns/{campaign}/{collection}`
pub fn collection_path(group_id: &str, campaign_id: &str, kind: EntityKind) -> String {
    format!(
        "groups/{group_id}/campaigns/{campaign_id}/{}",
        kind.collection_name()
    )
}

/// A complete scope bound to a signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScope {
    pub identity: Identity,
    pub group_id: String,
    pub campaign_id: String,
    pub character_name: Option<String>,
}

impl ActiveScope {
    pub fn collection_path(&self, kind: EntityKind) -> String {
        collection_path(&self.group_id, &self.campaign_id, kind)
    }

    /// The attribution author for writes made in this scope
    pub fn author(&self) -> Author {
        Author::new(&self.identity, self.character_name.as_deref())
    }
}

/// Holds the active tenant scope and the per-tenant character names.
#[derive(Debug)]
pub struct ScopeResolver {
    tx: watch::Sender<TenantScope>,
    character_names: DashMap<(String, String), String>,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::with_scope(TenantScope::default())
    }

    pub fn with_scope(scope: TenantScope) -> Self {
        let (tx, _rx) = watch::channel(scope);
        Self {
            tx,
            character_names: DashMap::new(),
        }
    }

    /// Snapshot of the active scope
    pub fn current(&self) -> TenantScope {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every scope change
    pub fn subscribe(&self) -> watch::Receiver<TenantScope> {
        self.tx.subscribe()
    }

    /// Switch the active group. Switching to a different group also clears
    /// the active campaign, which belongs to the old group.
    pub fn set_group(&self, group_id: Option<String>) -> bool {
        self.tx.send_if_modified(|scope| {
            if scope.active_group_id == group_id {
                return false;
            }
            debug!(from = ?scope.active_group_id, to = ?group_id, "active group changed");
            scope.active_group_id = group_id;
            scope.active_campaign_id = None;
            true
        })
    }

    pub fn set_campaign(&self, campaign_id: Option<String>) -> bool {
        self.tx.send_if_modified(|scope| {
            if scope.active_campaign_id == campaign_id {
                return false;
            }
            debug!(from = ?scope.active_campaign_id, to = ?campaign_id, "active campaign changed");
            scope.active_campaign_id = campaign_id;
            true
        })
    }

    /// Replace both halves at once, notifying watchers at most once.
    pub fn set_scope(&self, scope: TenantScope) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == scope {
                return false;
            }
            debug!(?scope, "tenant scope replaced");
            *current = scope;
            true
        })
    }

    pub fn set_character_name(
        &self,
        group_id: impl Into<String>,
        campaign_id: impl Into<String>,
        name: Option<String>,
    ) {
        let key = (group_id.into(), campaign_id.into());
        match name.filter(|n| !n.trim().is_empty()) {
            Some(name) => {
                self.character_names.insert(key, name);
            }
            None => {
                self.character_names.remove(&key);
            }
        }
    }

    /// Character name for the active tenant, if one is set
    pub fn character_name(&self) -> Option<String> {
        let scope = self.current();
        let key = (scope.active_group_id?, scope.active_campaign_id?);
        self.character_names.get(&key).map(|name| name.value().clone())
    }

    pub fn collection_path(&self, kind: EntityKind) -> Option<String> {
        self.current().collection_path(kind)
    }

    /// Resolve the scope a mutation runs in.
    ///
    /// Fails without touching the network when nobody is signed in or either
    /// half of the scope is unset.
    pub fn require(&self, auth: &dyn AuthService) -> ScopeResult<ActiveScope> {
        let identity = auth.current_identity().ok_or(ScopeError::NotAuthenticated)?;
        let scope = self.current();
        let group_id = scope.active_group_id.ok_or(ScopeError::MissingGroup)?;
        let campaign_id = scope.active_campaign_id.ok_or(ScopeError::MissingCampaign)?;
        let character_name = self
            .character_names
            .get(&(group_id.clone(), campaign_id.clone()))
            .map(|name| name.value().clone());
        Ok(ActiveScope {
            identity,
            group_id,
            campaign_id,
            character_name,
        })
    }
}
