//! Persistent key-value storage on a dedicated worker thread.
//!
//! The host runtime may suspend or kill the background process at any
//! time, so every cache in the engine is backed by this store and each
//! mutation is a single atomic key write. Two areas exist: a durable one
//! for captured pages and the insight singleton, and a session-scoped one
//! for conversation state, cleared by the engine's suspend teardown.
//!
//! SQLite access is confined to one thread; async callers submit closures
//! and await the reply over a oneshot channel.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

/// Well-known storage keys. Conversation keys are namespaced by tab id so
/// concurrent tabs never collide.
pub mod keys {
    pub const CAPTURED_PAGES: &str = "capturedPages";
    pub const CONTEXTUAL_INSIGHTS: &str = "contextualInsights";

    pub fn chat_history(tab_id: &str) -> String {
        format!("chat_history_{tab_id}")
    }

    pub fn page_context(tab_id: &str) -> String {
        format!("page_context_{tab_id}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Survives restarts; holds `capturedPages` and `contextualInsights`.
    Durable,
    /// Matches the active session's lifetime; cleared on suspend.
    Session,
}

impl StorageArea {
    fn table(self) -> &'static str {
        match self {
            StorageArea::Durable => "durable_store",
            StorageArea::Session => "session_store",
        }
    }
}

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("pagesense-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn get_raw(&self, area: StorageArea, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT value FROM {} WHERE key = ?1",
                area.table()
            ))?;
            let mut rows = stmt.query(params![key])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn put_raw(&self, area: StorageArea, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        let updated_at = Utc::now().to_rfc3339();
        self.execute(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                    area.table()
                ),
                params![key, value, updated_at],
            )
            .with_context(|| format!("failed to write storage key '{key}'"))?;
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, area: StorageArea, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                &format!("DELETE FROM {} WHERE key = ?1", area.table()),
                params![key],
            )
            .with_context(|| format!("failed to remove storage key '{key}'"))?;
            Ok(())
        })
        .await
    }

    pub async fn keys_with_prefix(&self, area: StorageArea, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT key FROM {} WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
                area.table()
            ))?;
            let mut rows = stmt.query(params![pattern])?;
            let mut found = Vec::new();
            while let Some(row) = rows.next()? {
                found.push(row.get::<_, String>(0)?);
            }
            Ok(found)
        })
        .await
    }

    /// Teardown hook for host suspend: drops every session-scoped key.
    pub async fn clear_session_area(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM session_store", [])
                .context("failed to clear session storage area")?;
            Ok(())
        })
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        area: StorageArea,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get_raw(area, key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt JSON under storage key '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn put_json<T: Serialize>(
        &self,
        area: StorageArea,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize value for storage key '{key}'"))?;
        self.put_raw(area, key, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("test.sqlite3")).expect("open db");
        (dir, db)
    }

    #[tokio::test]
    async fn round_trips_json_values() {
        let (_dir, db) = open_temp();

        db.put_json(StorageArea::Durable, "k", &vec![1u32, 2, 3])
            .await
            .expect("put");
        let got: Option<Vec<u32>> = db.get_json(StorageArea::Durable, "k").await.expect("get");
        assert_eq!(got, Some(vec![1, 2, 3]));

        db.remove(StorageArea::Durable, "k").await.expect("remove");
        let gone: Option<Vec<u32>> = db.get_json(StorageArea::Durable, "k").await.expect("get");
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn session_area_clears_without_touching_durable() {
        let (_dir, db) = open_temp();

        db.put_raw(StorageArea::Durable, "capturedPages", "[]".into())
            .await
            .expect("put durable");
        db.put_raw(StorageArea::Session, "chat_history_7", "[]".into())
            .await
            .expect("put session");

        db.clear_session_area().await.expect("clear");

        assert!(db
            .get_raw(StorageArea::Session, "chat_history_7")
            .await
            .expect("get")
            .is_none());
        assert!(db
            .get_raw(StorageArea::Durable, "capturedPages")
            .await
            .expect("get")
            .is_some());
    }

    #[tokio::test]
    async fn prefix_listing_matches_namespaced_keys() {
        let (_dir, db) = open_temp();

        for tab in ["3", "11"] {
            db.put_raw(StorageArea::Session, &keys::chat_history(tab), "[]".into())
                .await
                .expect("put");
        }
        db.put_raw(StorageArea::Session, &keys::page_context("3"), "{}".into())
            .await
            .expect("put");

        let found = db
            .keys_with_prefix(StorageArea::Session, "chat_history_")
            .await
            .expect("list");
        assert_eq!(found, vec!["chat_history_11", "chat_history_3"]);
    }
}
