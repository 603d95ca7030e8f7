use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;

mod error;
pub mod helpers;
mod migrations;
pub mod repositories;

pub use error::StoreError;

use crate::models::SignalSample;
use migrations::run_migrations;
use repositories::samples;

/// Durable, append-only table of signal samples.
///
/// Implementations must tolerate concurrent calls from producer threads and
/// the read side. Every failure is reported as a value; none of these calls
/// may panic.
pub trait SampleStore: Send + Sync {
    /// Write one sample. It is visible to every later query.
    fn append(&self, sample: &SignalSample) -> Result<(), StoreError>;

    /// Samples ordered by timestamp, most recent first. `None` returns all of them.
    fn query_recent(&self, limit: Option<usize>) -> Result<Vec<SignalSample>, StoreError>;

    /// Destroy all persisted data and leave an empty store in place.
    fn wipe_all(&self) -> Result<(), StoreError>;

    /// Bring up a fresh empty store after a failed wipe.
    fn reinitialize(&self) -> Result<(), StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|len| len == 0)
    }
}

/// Where a `SqliteStore` keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// SQLite-backed sample store.
///
/// A single worker thread owns the connection; every operation is a task sent
/// to it, so appends, queries and wipes are serialized and each query sees a
/// complete set of committed rows.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<StoreInner>,
    location: Arc<StoreLocation>,
}

fn open_connection(location: &StoreLocation) -> Result<Connection> {
    let mut conn = match location {
        StoreLocation::File(path) => {
            Connection::open(path).context("failed to open SQLite database")?
        }
        StoreLocation::Memory => {
            Connection::open_in_memory().context("failed to open in-memory SQLite database")?
        }
    };

    if let StoreLocation::File(_) = location {
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }
        if let Err(err) = conn.pragma_update(None, "synchronous", "NORMAL") {
            error!("Failed to relax synchronous mode: {err}");
        }
    }

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(anyhow::Error::new(err))
            .with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Close the connection and delete the database files, then reopen empty.
fn destroy_and_reopen(conn: &mut Connection, location: &StoreLocation) -> Result<(), StoreError> {
    let placeholder = Connection::open_in_memory()
        .map_err(|err| StoreError::destroy(anyhow::Error::new(err)))?;
    let previous = std::mem::replace(conn, placeholder);
    if let Err((previous, err)) = previous.close() {
        *conn = previous;
        return Err(StoreError::destroy(
            anyhow::Error::new(err).context("failed to close database before wipe"),
        ));
    }

    if let StoreLocation::File(path) = location {
        for candidate in [
            path.clone(),
            sidecar_path(path, "-wal"),
            sidecar_path(path, "-shm"),
        ] {
            remove_if_exists(&candidate).map_err(StoreError::destroy)?;
        }
    }

    *conn = open_connection(location).map_err(StoreError::init)?;
    Ok(())
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })
                .map_err(StoreError::init)?;
        }
        Self::start(StoreLocation::File(path))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::start(StoreLocation::Memory)
    }

    fn start(location: StoreLocation) -> Result<Self, StoreError> {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let location_for_thread = location.clone();

        let worker = thread::Builder::new()
            .name("beacon-trail-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&location_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                if ready_tx.send(Ok(())).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
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

                info!("Store thread shutting down");
            })
            .context("failed to spawn store worker thread")
            .map_err(StoreError::init)?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")
            .and_then(|result| result)
            .map_err(StoreError::init)?;

        match &location {
            StoreLocation::File(path) => info!("Sample store initialized at {}", path.display()),
            StoreLocation::Memory => info!("Sample store initialized in memory"),
        }

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            location: Arc::new(location),
        })
    }

    pub fn location(&self) -> &StoreLocation {
        self.location.as_ref()
    }

    /// Run `task` on the store thread and wait for its result.
    pub fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .recv()
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }
}

impl SampleStore for SqliteStore {
    fn append(&self, sample: &SignalSample) -> Result<(), StoreError> {
        let record = sample.clone();
        self.execute(move |conn| samples::insert_sample(conn, &record))
            .map_err(StoreError::write)
    }

    fn query_recent(&self, limit: Option<usize>) -> Result<Vec<SignalSample>, StoreError> {
        self.execute(move |conn| samples::select_recent_samples(conn, limit))
            .map_err(StoreError::read)
    }

    fn wipe_all(&self) -> Result<(), StoreError> {
        let location = self.location.as_ref().clone();
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = destroy_and_reopen(conn, &location);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving wipe result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| StoreError::DestroyFailed(format!("store thread unavailable: {err}")))?;

        let result = reply_rx.recv().map_err(|_| {
            StoreError::DestroyFailed("store thread terminated unexpectedly".into())
        })?;

        if result.is_ok() {
            info!("Sample store wiped");
        }
        result
    }

    fn reinitialize(&self) -> Result<(), StoreError> {
        let location = self.location.as_ref().clone();
        self.execute(move |conn| {
            match open_connection(&location) {
                Ok(fresh) => *conn = fresh,
                Err(err) => {
                    warn!("Reopening store failed, clearing current connection instead: {err:#}");
                    run_migrations(conn)?;
                }
            }
            samples::delete_all_samples(conn)
        })
        .map_err(StoreError::init)
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.execute(|conn| samples::count_samples(conn))
            .map_err(StoreError::read)
    }
}
