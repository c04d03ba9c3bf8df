//! Key-value-by-id persistence for memory records.
//!
//! [`Repository`] is the only storage surface the memory layer sees. Two
//! implementations are interchangeable and chosen once at startup:
//!
//! - [`InMemoryRepository`]: a mutex-guarded map, optionally mirrored to a JSON file
//!   that is rewritten atomically (temp file + rename) after every mutation.
//! - [`SqliteRepository`]: one row per record in the shared `documents` table, each
//!   upsert inside its own transaction.
//!
//! `upsert` is a read-modify-write applied atomically per call: either the whole
//! update lands or none of it does.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EngineError;

/// Anything a repository can hold.
pub trait Document: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {}

impl<T> Document for T where T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {}

pub trait Repository<T: Document>: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<T>, EngineError>;

    /// Apply `update` to the stored record (or to `T::default()` if absent) and store it.
    fn upsert(&self, id: &str, update: &mut dyn FnMut(&mut T)) -> Result<T, EngineError>;

    /// Create-only write. Fails if `id` already exists.
    fn insert(&self, id: &str, value: T) -> Result<(), EngineError>;

    /// Returns whether a record was removed.
    fn delete(&self, id: &str) -> Result<bool, EngineError>;

    /// All records matching `predicate`, ordered by id.
    fn query(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>, EngineError>;

    fn all(&self) -> Result<Vec<T>, EngineError> {
        self.query(&|_| true)
    }
}

fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── In-memory / JSON file ─────────────────────────────────────────────────────

pub struct InMemoryRepository<T> {
    docs: Mutex<BTreeMap<String, T>>,
    path: Option<PathBuf>,
}

impl<T: Document> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> InMemoryRepository<T> {
    /// Memory-only repository; contents die with the process.
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
            path: None,
        }
    }

    /// File-backed repository. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let docs = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                EngineError::Storage(format!("failed to read {}: {e}", path.display()))
            })?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), records = docs.len(), "json repository opened");
        Ok(Self {
            docs: Mutex::new(docs),
            path: Some(path),
        })
    }

    fn persist(&self, docs: &BTreeMap<String, T>) -> Result<(), EngineError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(docs)?;
        std::fs::write(&tmp, body)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|e| EngineError::Storage(format!("failed to write {}: {e}", path.display())))
    }

    /// Run a mutation and persist it, rolling back the map if persisting fails.
    fn mutate<R>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut BTreeMap<String, T>) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let mut docs = lock(&self.docs);
        let previous = docs.get(id).cloned();
        let out = apply(&mut *docs)?;
        if let Err(e) = self.persist(&docs) {
            match previous {
                Some(prev) => docs.insert(id.to_string(), prev),
                None => docs.remove(id),
            };
            return Err(e);
        }
        Ok(out)
    }
}

impl<T: Document> Repository<T> for InMemoryRepository<T> {
    fn get(&self, id: &str) -> Result<Option<T>, EngineError> {
        Ok(lock(&self.docs).get(id).cloned())
    }

    fn upsert(&self, id: &str, update: &mut dyn FnMut(&mut T)) -> Result<T, EngineError> {
        self.mutate(id, |docs| {
            let mut doc = docs.get(id).cloned().unwrap_or_default();
            update(&mut doc);
            docs.insert(id.to_string(), doc.clone());
            Ok(doc)
        })
    }

    fn insert(&self, id: &str, value: T) -> Result<(), EngineError> {
        self.mutate(id, |docs| {
            if docs.contains_key(id) {
                return Err(EngineError::Storage(format!("record already exists: {id}")));
            }
            docs.insert(id.to_string(), value);
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<bool, EngineError> {
        self.mutate(id, |docs| Ok(docs.remove(id).is_some()))
    }

    fn query(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>, EngineError> {
        Ok(lock(&self.docs)
            .values()
            .filter(|d| predicate(d))
            .cloned()
            .collect())
    }
}

// ── SQLite ────────────────────────────────────────────────────────────────────

pub struct SqliteRepository<T> {
    conn: Arc<Mutex<Connection>>,
    collection: String,
    _doc: PhantomData<fn() -> T>,
}

impl<T: Document> SqliteRepository<T> {
    /// A view of `collection` over a shared connection.
    pub fn new(conn: Arc<Mutex<Connection>>, collection: impl Into<String>) -> Self {
        Self {
            conn,
            collection: collection.into(),
            _doc: PhantomData,
        }
    }

    fn read(conn: &Connection, collection: &str, id: &str) -> Result<Option<T>, EngineError> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
    }
}

impl<T: Document> Repository<T> for SqliteRepository<T> {
    fn get(&self, id: &str) -> Result<Option<T>, EngineError> {
        let conn = lock(&self.conn);
        Self::read(&conn, &self.collection, id)
    }

    fn upsert(&self, id: &str, update: &mut dyn FnMut(&mut T)) -> Result<T, EngineError> {
        let mut conn = lock(&self.conn);
        let tx = conn.transaction()?;

        let mut doc = Self::read(&tx, &self.collection, id)?.unwrap_or_default();
        update(&mut doc);
        let body = serde_json::to_string(&doc)?;
        let now = chrono::Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![self.collection, id, body, now],
        )?;
        tx.commit()?;
        Ok(doc)
    }

    fn insert(&self, id: &str, value: T) -> Result<(), EngineError> {
        let conn = lock(&self.conn);
        let body = serde_json::to_string(&value)?;
        let now = chrono::Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![self.collection, id, body, now],
        )?;
        if inserted == 0 {
            return Err(EngineError::Storage(format!("record already exists: {id}")));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, EngineError> {
        let conn = lock(&self.conn);
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![self.collection, id],
        )?;
        Ok(removed > 0)
    }

    fn query(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>, EngineError> {
        let conn = lock(&self.conn);
        let mut stmt =
            conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")?;
        let bodies = stmt
            .query_map([&self.collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        for body in bodies {
            let doc: T = serde_json::from_str(&body)?;
            if predicate(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
        tags: Vec<String>,
    }

    fn exercise(repo: &dyn Repository<Counter>) {
        assert!(repo.get("a").unwrap().is_none());

        let c = repo.upsert("a", &mut |c| c.hits += 1).unwrap();
        assert_eq!(c.hits, 1);
        repo.upsert("a", &mut |c| c.tags.push("x".into())).unwrap();
        assert_eq!(
            repo.get("a").unwrap(),
            Some(Counter {
                hits: 1,
                tags: vec!["x".into()]
            })
        );

        repo.insert("b", Counter { hits: 5, tags: vec![] }).unwrap();
        assert!(repo.insert("b", Counter::default()).is_err());

        let busy = repo.query(&|c| c.hits >= 5).unwrap();
        assert_eq!(busy.len(), 1);
        assert_eq!(repo.all().unwrap().len(), 2);

        assert!(repo.delete("a").unwrap());
        assert!(!repo.delete("a").unwrap());
        assert!(repo.get("a").unwrap().is_none());
    }

    #[test]
    fn in_memory_contract() {
        exercise(&InMemoryRepository::<Counter>::new());
    }

    #[test]
    fn sqlite_contract() {
        let conn = crate::db::open_memory_database().unwrap();
        exercise(&SqliteRepository::<Counter>::new(Arc::new(Mutex::new(conn)), "counters"));
    }

    #[test]
    fn sqlite_collections_are_isolated() {
        let conn = Arc::new(Mutex::new(crate::db::open_memory_database().unwrap()));
        let a = SqliteRepository::<Counter>::new(conn.clone(), "a");
        let b = SqliteRepository::<Counter>::new(conn, "b");
        a.upsert("same", &mut |c| c.hits = 1).unwrap();
        assert!(b.get("same").unwrap().is_none());
    }
}
