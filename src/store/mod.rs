//! Remote document store adapters
//!
//! The synchronization layer talks to storage only through the
//! `DocumentStore` trait. `MemoryStore` backs tests and demos; `SqliteStore`
//! is a persistent single-file store.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    into_document, merge_document, BatchDelete, BatchFailure, Document, DocumentStore, OpenStore,
    StoreError, StoreResult, StoredDocument,
};
