//! The location service. Owns the store, the capture pipeline and the
//! durability task, and is the only surface the host talks to.
//!
//! LIFECYCLE:
//!   1. `init` loads every snapshot file (migrating as needed) into the
//!      store, primes territory and music state, and starts the flush task.
//!   2. The host calls `tick` every frame and forwards signals through
//!      `handle` (or the matching `on_*` methods).
//!   3. `dispose` (or drop) cancels the flush task; queued saves finish.
//!
//! RULE: everything except the flush task runs on the host's live-update
//! thread. Nothing here blocks that thread on file I/O except `save_now`.

use crate::{
    capture::CapturePipeline,
    config::LocationConfig,
    durability::{DurabilityTask, FlushContext, LoadReport, SessionState, SnapshotDirectory},
    error::LocationResult,
    host::{GameData, LiveStateSource, SceneHost},
    signal::HostSignal,
    snapshot::Snapshot,
    store::SnapshotStore,
    types::{identity_hex, Identity, InstanceId},
};
use parking_lot::RwLock;
use std::{path::PathBuf, sync::Arc};

/// The collaborators the service reads from.
#[derive(Clone)]
pub struct HostBindings {
    pub live:  Arc<dyn LiveStateSource>,
    pub scene: Arc<dyn SceneHost>,
    pub data:  Arc<dyn GameData>,
}

pub struct LocationService {
    store:       Arc<SnapshotStore>,
    directory:   SnapshotDirectory,
    config:      Arc<RwLock<LocationConfig>>,
    session:     Arc<SessionState>,
    pipeline:    CapturePipeline,
    host:        HostBindings,
    durability:  Option<DurabilityTask>,
    load_report: LoadReport,
}

impl LocationService {
    pub fn init(
        config: LocationConfig,
        directory: impl Into<PathBuf>,
        host: HostBindings,
    ) -> LocationResult<Self> {
        let directory = SnapshotDirectory::new(directory);
        let store = Arc::new(SnapshotStore::new());
        let load_report = directory.load_into(&store)?;
        log::info!(
            "Loaded {} location snapshot(s), {} upgraded, {} skipped",
            load_report.loaded.len(),
            load_report.migrated.len(),
            load_report.skipped.len()
        );

        let config = Arc::new(RwLock::new(config));
        let session = Arc::new(SessionState::new());
        if let Some(identity) = host.live.current_identity() {
            session.set_logged_in(true);
            session.set_last_identity(identity);
        }

        let durability = DurabilityTask::spawn(FlushContext {
            store:     Arc::clone(&store),
            directory: directory.clone(),
            config:    Arc::clone(&config),
            session:   Arc::clone(&session),
        })?;

        let mut service = Self {
            store,
            directory,
            config,
            session,
            pipeline: CapturePipeline::new(),
            host,
            durability: Some(durability),
            load_report,
        };
        service.on_territory_changed(service.host.live.current_territory_id());
        service.on_song_changed(service.host.data.current_song_id());
        Ok(service)
    }

    // ── Reads ─────────────────────────────────────────────────

    /// The snapshot for `identity`, or the default location.
    pub fn get(&self, identity: Identity) -> Arc<Snapshot> {
        self.store.get(identity)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn directory(&self) -> &SnapshotDirectory {
        &self.directory
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn refresh_pending(&self) -> bool {
        self.pipeline.refresh_pending()
    }

    pub fn last_identity(&self) -> Option<Identity> {
        self.session.last_identity()
    }

    pub fn config(&self) -> LocationConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: LocationConfig) {
        *self.config.write() = config;
    }

    // ── Capture ───────────────────────────────────────────────

    /// Capture one tick of live state.
    pub fn tick(&mut self) -> Option<Identity> {
        let config = self.config();
        let captured = self.pipeline.tick(
            &config,
            self.host.live.as_ref(),
            self.host.scene.as_ref(),
            &self.store,
        );
        if let Some(identity) = self.pipeline.last_identity() {
            self.session.set_last_identity(identity);
        }
        captured
    }

    pub fn handle(&mut self, signal: HostSignal) {
        log::trace!("Signal {}", signal.name());
        match signal {
            HostSignal::Login { identity } => self.on_login(identity),
            HostSignal::Logout => self.on_logout(),
            HostSignal::TerritoryChanged { territory_id } => self.on_territory_changed(territory_id),
            HostSignal::LayoutChanged => self.on_layout_changed(),
            HostSignal::InstanceActiveChanged { instance_id, active } => {
                self.on_instance_active_changed(instance_id, active);
            }
            HostSignal::SongChanged { song_id } => self.on_song_changed(song_id),
        }
    }

    pub fn on_login(&mut self, identity: Identity) {
        log::debug!("Login {}", identity_hex(identity));
        self.session.set_last_identity(identity);
        self.session.set_logged_in(true);
    }

    /// Queue a save of the last active identity and end the session.
    pub fn on_logout(&mut self) {
        if let Some(identity) = self.session.last_identity() {
            self.save(identity);
        }
        self.session.set_logged_in(false);
    }

    pub fn on_territory_changed(&mut self, territory_id: u16) {
        self.pipeline
            .on_territory_changed(territory_id, self.host.data.as_ref());
    }

    pub fn on_layout_changed(&mut self) {
        self.pipeline.on_layout_changed();
    }

    pub fn on_instance_active_changed(&mut self, instance_id: InstanceId, active: bool) {
        let identity = self
            .host
            .live
            .current_live_values()
            .and(self.host.live.current_identity());
        self.pipeline
            .on_instance_active_changed(instance_id, active, identity, &self.store);
    }

    pub fn on_song_changed(&mut self, song_id: i32) {
        self.pipeline.on_song_changed(song_id, self.host.data.as_ref());
    }

    // ── Saving ────────────────────────────────────────────────

    /// Queue an explicit save. The flush task writes it off this thread.
    pub fn save(&self, identity: Identity) {
        match &self.durability {
            Some(task) => task.request_save(identity),
            None => log::warn!("Save {} requested after dispose", identity_hex(identity)),
        }
    }

    /// Write `identity` immediately on the calling thread.
    /// Returns None if the store has nothing for it.
    pub fn save_now(&self, identity: Identity) -> LocationResult<Option<PathBuf>> {
        if !self.store.contains(identity) {
            return Ok(None);
        }
        let snapshot = self.store.get(identity);
        self.directory.write(identity, &snapshot).map(Some)
    }

    /// Stop the flush task. Queued saves are written first.
    pub fn dispose(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(mut task) = self.durability.take() {
            task.shutdown();
        }
    }
}

impl Drop for LocationService {
    fn drop(&mut self) {
        self.stop();
    }
}
