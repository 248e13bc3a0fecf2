//! SQLite-backed property graph: nodes, typed directed edges, key/value
//! properties, scoped transactions and lazy traversals.

mod graph;
mod schema;
mod traversal;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};

use crate::config::StoreConfig;

pub use graph::*;
pub use traversal::*;

pub struct GraphDb {
    conn: Arc<Mutex<Connection>>,
}

impl GraphDb {
    pub fn open(path: PathBuf) -> Result<Self> {
        Self::open_with_timeout(path, StoreConfig::default().busy_timeout)
    }

    fn open_with_timeout(path: PathBuf, busy_timeout: Duration) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Store path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the store described by `config`, in memory when it has no path.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open_with_timeout(path.clone(), config.busy_timeout),
            None => Self::open_memory(),
        }
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        schema::run_migrations(&conn)
    }

    /// Run `f` inside one atomic transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err`, so an aborted operation leaves nothing behind. The
    /// connection stays locked for the whole call; code running inside `f`
    /// must use the `GraphTx` it is given rather than opening another
    /// transaction on the same handle.
    pub fn transaction<T, F>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&GraphTx<'_>) -> crate::Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let graph = GraphTx::new(tx);

        match f(&graph) {
            Ok(value) => {
                graph.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = graph.rollback() {
                    tracing::error!(error = %rollback, "Failed to roll back transaction");
                }
                Err(e)
            }
        }
    }

    /// Total number of nodes, including registry roots.
    pub fn node_count(&self) -> crate::Result<usize> {
        self.transaction(|tx| tx.node_count())
    }
}

impl Clone for GraphDb {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl std::fmt::Debug for GraphDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDb").finish_non_exhaustive()
    }
}
