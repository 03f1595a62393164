//! Synchronizer errors

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("collection is not bound to a tenant scope")]
    Unscoped,

    /// A newer fetch, a retarget or a sign-out happened while this fetch
    /// was in flight; its response was discarded.
    #[error("fetch superseded by a newer request")]
    Superseded,
}

impl SyncError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
