//! Collection synchronization
//!
//! `CollectionSync` mirrors one remote collection into a local cache.
//! Writes go to the store first; the cache changes only after the store
//! acknowledges. Every mutation hands back an `Optimistic` value carrying a
//! rollback for the local change.

mod busy;
mod collection;
mod error;
mod optimistic;
mod patch;
mod record;

pub use busy::{BusyFlag, BusyGuard};
pub use collection::CollectionSync;
pub use error::{SyncError, SyncResult};
pub use optimistic::{Optimistic, Rollback};
pub use patch::Patch;
pub use record::{decode, encode, Record};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
