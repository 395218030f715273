//! SQLite adapter backed by a small connection pool.
//!
//! `rusqlite::Connection` is not `Sync`, so workers check connections out of
//! a bounded channel and return them when the call finishes. Documents are
//! stored as JSON bodies next to the two indexed query columns.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use rusqlite::{params, Connection, OptionalExtension};

use docbench_core::{Document, QueryArg, QueryKind};

use crate::store::DocStore;
use crate::{BenchError, BenchResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS docs (
    key         TEXT PRIMARY KEY,
    body        TEXT NOT NULL,
    category    INTEGER NOT NULL,
    local_group TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_docs_category ON docs(category);
CREATE INDEX IF NOT EXISTS idx_docs_local_group ON docs(local_group);
";

pub struct SqliteStore {
    sender: Sender<Connection>,
    receiver: Receiver<Connection>,
}

impl SqliteStore {
    /// Open `pool_size` connections against `path`, creating the schema if
    /// needed. One connection per worker avoids checkout contention.
    pub fn open(path: &Path, pool_size: usize) -> BenchResult<Self> {
        let pool_size = pool_size.max(1);
        let (sender, receiver) = bounded(pool_size);

        for i in 0..pool_size {
            let conn = Connection::open(path)
                .map_err(|e| BenchError::Store(format!("open {}: {}", path.display(), e)))?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| BenchError::Store(format!("journal_mode: {}", e)))?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(|e| BenchError::Store(format!("synchronous: {}", e)))?;
            conn.busy_timeout(Duration::from_secs(5))
                .map_err(|e| BenchError::Store(format!("busy_timeout: {}", e)))?;
            if i == 0 {
                conn.execute_batch(SCHEMA)
                    .map_err(|e| BenchError::Store(format!("schema: {}", e)))?;
            }
            let _ = sender.send(conn);
        }

        Ok(Self { sender, receiver })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> BenchResult<T>) -> BenchResult<T> {
        let conn = self
            .receiver
            .recv()
            .map_err(|_| BenchError::Store("connection pool closed".into()))?;
        let result = f(&conn);
        let _ = self.sender.send(conn);
        result
    }

    fn upsert(&self, op: &str, key: &str, doc: &Document) -> BenchResult<()> {
        let body = serde_json::to_string(doc)
            .map_err(|e| BenchError::Store(format!("{} {}: serialize: {}", op, key, e)))?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO docs (key, body, category, local_group) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, body, doc.category, doc.local_group],
            )
            .map_err(|e| BenchError::Store(format!("{} {}: {}", op, key, e)))?;
            Ok(())
        })
    }
}

impl DocStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn create(&self, key: &str, doc: &Document) -> BenchResult<()> {
        self.upsert("create", key, doc)
    }

    fn read(&self, key: &str) -> BenchResult<Option<Document>> {
        self.with_conn(|conn| {
            let body: Option<String> = conn
                .query_row("SELECT body FROM docs WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|e| BenchError::Store(format!("read {}: {}", key, e)))?;

            match body {
                Some(raw) => {
                    let doc = serde_json::from_str(&raw)
                        .map_err(|e| BenchError::Store(format!("read {}: decode: {}", key, e)))?;
                    Ok(Some(doc))
                }
                None => Ok(None),
            }
        })
    }

    fn update(&self, key: &str, doc: &Document) -> BenchResult<()> {
        self.upsert("update", key, doc)
    }

    fn delete(&self, key: &str) -> BenchResult<()> {
        self.with_conn(|conn| {
            let rows = conn
                .execute("DELETE FROM docs WHERE key = ?1", [key])
                .map_err(|e| BenchError::Store(format!("delete {}: {}", key, e)))?;
            if rows == 0 {
                return Err(BenchError::Store(format!("delete {}: no such key", key)));
            }
            Ok(())
        })
    }

    fn query(&self, kind: QueryKind, arg: &QueryArg) -> BenchResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = match (kind, arg) {
                (QueryKind::ByCategory, QueryArg::Int(v)) => conn
                    .query_row(
                        "SELECT COUNT(*) FROM docs WHERE category = ?1",
                        [*v],
                        |row| row.get(0),
                    )
                    .map_err(|e| BenchError::Store(format!("query category: {}", e)))?,
                (QueryKind::ByLocalGroup, QueryArg::Text(v)) => conn
                    .query_row(
                        "SELECT COUNT(*) FROM docs WHERE local_group = ?1",
                        [v.as_str()],
                        |row| row.get(0),
                    )
                    .map_err(|e| BenchError::Store(format!("query local_group: {}", e)))?,
                (kind, arg) => {
                    return Err(BenchError::Store(format!(
                        "query {:?}: mismatched argument {:?}",
                        kind, arg
                    )))
                }
            };
            Ok(count as u64)
        })
    }
}
