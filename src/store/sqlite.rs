//! SQLite document store

use super::traits::{
    into_document, merge_document, BatchDelete, BatchFailure, Document, DocumentStore, OpenStore,
    StoreError, StoreResult, StoredDocument,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite-backed document store
///
/// Every collection shares one `documents` table keyed by
/// `(collection, id)`; bodies are stored as JSON text. Thread-safe via an
/// internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body_json TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|json| -> StoreResult<Document> { into_document(serde_json::from_str(&json)?) })
            .transpose()
    }

    fn save(conn: &Connection, collection: &str, id: &str, body: &Document) -> StoreResult<()> {
        let json = serde_json::to_string(body)?;
        conn.execute(
            r#"
            INSERT INTO documents (collection, id, body_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(collection, id) DO UPDATE SET body_json = excluded.body_json
            "#,
            params![collection, id, json],
        )?;
        Ok(())
    }

    /// Delete `ids` in one transaction. On failure nothing is deleted and
    /// the error names the id whose statement failed; a failed begin names
    /// the first id and a failed commit the last.
    fn delete_all(conn: &mut Connection, collection: &str, ids: &[String]) -> Result<(), BatchFailure> {
        let failure = |id: Option<&String>, e: rusqlite::Error| BatchFailure {
            id: id.cloned().unwrap_or_default(),
            message: StoreError::from(e).to_string(),
        };
        let tx = conn.transaction().map_err(|e| failure(ids.first(), e))?;
        for id in ids {
            tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .map_err(|e| failure(Some(id), e))?;
        }
        tx.commit().map_err(|e| failure(ids.last(), e))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_collection(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, body_json FROM documents WHERE collection = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, json)| -> StoreResult<StoredDocument> {
                let data = into_document(serde_json::from_str(&json)?)?;
                Ok(StoredDocument::new(id, data))
            })
            .collect()
    }

    async fn set_document(&self, collection: &str, id: &str, value: Document) -> StoreResult<()> {
        let conn = self.conn();
        Self::save(&conn, collection, id, &value)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<()> {
        let conn = self.conn();
        let mut body = Self::load(&conn, collection, id)?.ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        merge_document(&mut body, &partial);
        Self::save(&conn, collection, id, &body)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(())
    }

    /// All-or-nothing: the batch runs in one transaction.
    async fn delete_documents(&self, collection: &str, ids: &[String]) -> BatchDelete {
        let mut conn = self.conn();
        match Self::delete_all(&mut conn, collection, ids) {
            Ok(()) => BatchDelete {
                applied: ids.to_vec(),
                failed: None,
            },
            Err(failure) => BatchDelete {
                applied: Vec::new(),
                failed: Some(failure),
            },
        }
    }
}
