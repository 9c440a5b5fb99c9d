use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations::ensure_schema, BlobStore};

type Reply<T> = mpsc::Sender<Result<T>>;

enum BlobOp {
    Get { key: String, reply: Reply<Option<String>> },
    Set { key: String, blob: String, reply: Reply<()> },
    Delete { key: String, reply: Reply<()> },
}

/// Thread that owns the connection. Dropping the last handle closes the
/// queue, which ends the thread.
struct Worker {
    ops: Option<mpsc::Sender<BlobOp>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.ops.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Blob store thread panicked");
            }
        }
    }
}

/// SQLite-backed blob store. Operations queue onto one thread and callers
/// block until theirs has run.
#[derive(Clone)]
pub struct SqliteStore {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl SqliteStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create blob store directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open blob store {}", path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Blob store stays in rollback-journal mode: {err}");
        }
        ensure_schema(&conn)?;

        let (ops, queue) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("thermosense-store".into())
            .spawn(move || serve(conn, queue))
            .context("failed to spawn blob store thread")?;

        info!("Blob store ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                ops: Some(ops),
                thread: Some(thread),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn request<T>(&self, op: impl FnOnce(Reply<T>) -> BlobOp) -> Result<T> {
        let ops = self
            .worker
            .ops
            .as_ref()
            .ok_or_else(|| anyhow!("blob store is shut down"))?;
        let (reply, answer) = mpsc::channel();
        ops.send(op(reply))
            .map_err(|_| anyhow!("blob store thread has exited"))?;
        answer
            .recv()
            .map_err(|_| anyhow!("blob store thread dropped the request"))?
    }
}

fn serve(conn: Connection, queue: mpsc::Receiver<BlobOp>) {
    for op in queue {
        let delivered = match op {
            BlobOp::Get { key, reply } => reply.send(read(&conn, &key)).is_ok(),
            BlobOp::Set { key, blob, reply } => reply.send(write(&conn, &key, &blob)).is_ok(),
            BlobOp::Delete { key, reply } => reply.send(remove(&conn, &key)).is_ok(),
        };
        if !delivered {
            warn!("Blob store caller went away before its reply");
        }
    }
    info!("Blob store thread exiting");
}

fn read(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM blobs WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .with_context(|| format!("failed to read blob '{key}'"))
}

fn write(conn: &Connection, key: &str, blob: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                        updated_at = excluded.updated_at",
        params![key, blob, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("failed to write blob '{key}'"))?;
    Ok(())
}

fn remove(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])
        .with_context(|| format!("failed to delete blob '{key}'"))?;
    Ok(())
}

impl BlobStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.request(|reply| BlobOp::Get { key, reply })
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        let (key, blob) = (key.to_string(), blob.to_string());
        self.request(|reply| BlobOp::Set { key, blob, reply })
    }

    fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.request(|reply| BlobOp::Delete { key, reply })
    }
}
