//! Domain error types

use super::kind::EntityKind;
use crate::scope::ScopeError;
use crate::store::StoreError;
use crate::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("a {kind} with id '{id}' already exists")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("delete of {kind} stopped at '{failed_id}' after {} of {total} records: {message}", applied.len())]
    PartialDelete {
        kind: EntityKind,
        applied: Vec<String>,
        failed_id: String,
        total: usize,
        message: String,
    },
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        Self::Sync(SyncError::Store(e))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
