//! Snapshot files and the background flush task.
//!
//! RULE: one file per identity, named `<16 uppercase hex digits>.json`.
//! Only `SnapshotDirectory` touches the file system.
//!
//! The flush task wakes every `POLL_INTERVAL`. It writes queued explicit
//! saves, and once per save period writes the last active identity if
//! periodic saving is enabled and a session is active. A failed write is
//! logged; the snapshot stays in memory and is retried on the next period.

use crate::{
    clock::{FlushClock, POLL_INTERVAL},
    config::LocationConfig,
    error::{LocationError, LocationResult},
    migration::{self, Migrated},
    snapshot::Snapshot,
    store::SnapshotStore,
    types::{identity_hex, parse_snapshot_file_name, snapshot_file_name, Identity, SchemaVersion},
};
use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

// ── Directory ──────────────────────────────────────────────────

/// Outcome of loading a snapshot directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded:   Vec<Identity>,
    /// Identities upgraded from an older schema, with the version they had.
    pub migrated: Vec<(Identity, SchemaVersion)>,
    pub skipped:  Vec<PathBuf>,
}

/// Clones share one set of per-identity write locks, so writes to the same
/// file never overlap no matter which thread issues them.
#[derive(Debug, Clone)]
pub struct SnapshotDirectory {
    root:   PathBuf,
    writes: Arc<Mutex<HashMap<Identity, Arc<Mutex<()>>>>>,
}

impl SnapshotDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), writes: Arc::default() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, identity: Identity) -> PathBuf {
        self.root.join(snapshot_file_name(identity))
    }

    /// The identity a snapshot file belongs to, from its name alone.
    pub fn identity_of(path: &Path) -> LocationResult<Identity> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        parse_snapshot_file_name(name)
            .ok_or_else(|| LocationError::InvalidFileName { name: name.to_string() })
    }

    /// Serialize `snapshot` to its identity's file.
    /// Writes a uniquely named temporary sibling first, then renames it over
    /// the target. Writes for one identity are serialized.
    pub fn write(&self, identity: Identity, snapshot: &Snapshot) -> LocationResult<PathBuf> {
        let lock = self.write_lock(identity);
        let _guard = lock.lock();
        self.write_inner(identity, snapshot)
            .map_err(|e| LocationError::save(identity, e))
    }

    fn write_inner(&self, identity: Identity, snapshot: &Snapshot) -> LocationResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let final_path = self.path_for(identity);

        let json = serde_json::to_string_pretty(snapshot)?;
        let mut file = NamedTempFile::new_in(&self.root)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;

        file.persist(&final_path).map_err(|e| e.error)?;
        Ok(final_path)
    }

    fn write_lock(&self, identity: Identity) -> Arc<Mutex<()>> {
        let mut writes = self.writes.lock();
        Arc::clone(writes.entry(identity).or_default())
    }

    /// Read, migrate and canonicalize one file.
    pub fn read(&self, path: &Path) -> LocationResult<Migrated> {
        let read = || -> LocationResult<Migrated> {
            let text = fs::read_to_string(path)?;
            migration::decode(&text)
        };
        read().map_err(|e| LocationError::load(path, e))
    }

    /// Read one identity's file, if it exists.
    pub fn read_identity(&self, identity: Identity) -> LocationResult<Option<Migrated>> {
        let path = self.path_for(identity);
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path).map(Some)
    }

    /// Load every snapshot file into `store`.
    ///
    /// A file that fails to load is logged and skipped. Only failing to
    /// list the directory itself is an error; a missing directory loads
    /// nothing.
    pub fn load_into(&self, store: &SnapshotStore) -> LocationResult<LoadReport> {
        let mut report = LoadReport::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Snapshot directory {} does not exist yet", self.root.display());
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(Identity, PathBuf)> = Vec::new();
        for entry in entries {
            let path = entry?.path();
            match Self::identity_of(&path) {
                Ok(identity) if path.is_file() => files.push((identity, path)),
                _ => log::debug!("Unknown file in snapshot directory: {}", path.display()),
            }
        }
        files.sort();

        for (identity, path) in files {
            log::debug!("Loading {}", identity_hex(identity));
            match self.read(&path) {
                Ok(migrated) => {
                    if migrated.changed {
                        log::info!(
                            "Upgraded {} from v{}",
                            identity_hex(identity),
                            migrated.from_version
                        );
                        report.migrated.push((identity, migrated.from_version));
                    }
                    store.seed(identity, migrated.snapshot);
                    report.loaded.push(identity);
                }
                Err(e) => {
                    log::error!("{e}");
                    report.skipped.push(path);
                }
            }
        }
        Ok(report)
    }
}

// ── Cancellation ───────────────────────────────────────────────

/// Cooperative cancellation signal shared with the flush task.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ── Session ────────────────────────────────────────────────────

/// Session facts the live thread publishes for the flush task.
#[derive(Debug, Default)]
pub struct SessionState {
    logged_in:     AtomicBool,
    last_identity: Mutex<Option<Identity>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn set_last_identity(&self, identity: Identity) {
        *self.last_identity.lock() = Some(identity);
    }

    pub fn last_identity(&self) -> Option<Identity> {
        *self.last_identity.lock()
    }
}

// ── Flush task ─────────────────────────────────────────────────

/// Everything the flush task shares with the live thread.
#[derive(Clone)]
pub struct FlushContext {
    pub store:     Arc<SnapshotStore>,
    pub directory: SnapshotDirectory,
    pub config:    Arc<RwLock<LocationConfig>>,
    pub session:   Arc<SessionState>,
}

impl FlushContext {
    /// Write one identity's snapshot. Returns the written path, or None if
    /// there was nothing to write or the write failed.
    pub fn flush(&self, identity: Identity) -> Option<PathBuf> {
        log::debug!("Save {}", identity_hex(identity));
        if !self.store.contains(identity) {
            log::warn!("Nothing to save for {}", identity_hex(identity));
            return None;
        }
        let started = Instant::now();
        let snapshot = self.store.get(identity);
        let result = self.directory.write(identity, &snapshot);
        log::debug!("Save took {:.3} ms", started.elapsed().as_secs_f64() * 1000.0);
        match result {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("{e}");
                None
            }
        }
    }

    /// Flush the last active identity if the period rules allow it.
    fn periodic_flush(&self) {
        let periodic = self.config.read().periodic_flush_enabled();
        if !periodic || !self.session.is_logged_in() {
            return;
        }
        if let Some(identity) = self.session.last_identity() {
            self.flush(identity);
        }
    }
}

pub struct DurabilityTask {
    token:  CancellationToken,
    queue:  Arc<Mutex<Vec<Identity>>>,
    handle: Option<JoinHandle<()>>,
}

impl DurabilityTask {
    pub fn spawn(context: FlushContext) -> LocationResult<Self> {
        let token = CancellationToken::new();
        let queue: Arc<Mutex<Vec<Identity>>> = Arc::default();
        let handle = {
            let token = token.clone();
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("location-durability".to_string())
                .spawn(move || run(context, token, queue))?
        };
        Ok(Self { token, queue, handle: Some(handle) })
    }

    /// Queue an explicit save. Written on the task's next wake-up.
    pub fn request_save(&self, identity: Identity) {
        let mut queue = self.queue.lock();
        if !queue.contains(&identity) {
            queue.push(identity);
        }
    }

    pub fn pending_saves(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal cancellation and wait for the loop to exit.
    /// Queued saves are written before the task stops.
    pub fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Durability task panicked");
            }
        }
    }
}

impl Drop for DurabilityTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(context: FlushContext, token: CancellationToken, queue: Arc<Mutex<Vec<Identity>>>) {
    let mut clock = FlushClock::new(Instant::now());
    log::debug!("Durability task started");
    while !token.is_cancelled() {
        thread::sleep(POLL_INTERVAL);
        drain(&context, &queue);

        let now = Instant::now();
        let period = context.config.read().save_period();
        if clock.is_due(now, period) {
            context.periodic_flush();
            clock.mark(now);
        }
    }
    drain(&context, &queue);
    log::debug!("Durability task stopped");
}

fn drain(context: &FlushContext, queue: &Mutex<Vec<Identity>>) {
    let pending = std::mem::take(&mut *queue.lock());
    for identity in pending {
        context.flush(identity);
    }
}
