//! In-process stand-in for the game host, shared by the integration tests.
#![allow(dead_code)]

use location_core::{
    host::{GameData, InstanceKind, LiveStateSource, LiveValues, SceneHost, SceneInstance},
    snapshot::{MountModel, MovementMode, Vec3, FESTIVAL_SLOTS},
    HostBindings,
};
use parking_lot::Mutex;
use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

pub const PLAYER: u64 = 0x0040_0000_1234_ABCD;
pub const TERRITORY: u16 = 132;

#[derive(Debug, Clone)]
pub struct HostState {
    pub identity:           Option<u64>,
    pub live:               Option<LiveValues>,
    pub territory_id:       u16,
    pub layout_initialized: bool,
    pub instances:          Vec<SceneInstance>,
    pub festivals:          [u32; FESTIVAL_SLOTS],
    pub song_id:            i32,
}

pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    /// A logged-in player standing in `TERRITORY` with an initialized layout.
    pub fn new() -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            state: Mutex::new(HostState {
                identity:           Some(PLAYER),
                live:               Some(live_values()),
                territory_id:       TERRITORY,
                layout_initialized: true,
                instances:          Vec::new(),
                festivals:          [0; FESTIVAL_SLOTS],
                song_id:            7,
            }),
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut *self.state.lock());
    }

    pub fn bindings(self: &Arc<Self>) -> HostBindings {
        HostBindings {
            live:  self.clone(),
            scene: self.clone(),
            data:  self.clone(),
        }
    }
}

/// Route library logs through the test harness. Set RUST_LOG to see them.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn live_values() -> LiveValues {
    LiveValues {
        position:       Vec3::new(10.5, -2.0, 300.25),
        rotation:       1.25,
        weather_id:     4,
        movement_mode:  MovementMode::Normal,
        mount:          MountModel::default(),
        eorzea_seconds: 13 * 3600 + 30 * 60,
    }
}

pub fn instance(id: u64, active: bool) -> SceneInstance {
    SceneInstance { id, active, kind: InstanceKind::Other, trigger_index: -1 }
}

pub fn vfx(id: u64, active: bool, trigger_index: i16) -> SceneInstance {
    SceneInstance { id, active, kind: InstanceKind::Vfx, trigger_index }
}

impl LiveStateSource for FakeHost {
    fn current_identity(&self) -> Option<u64> {
        self.state.lock().identity
    }

    fn current_live_values(&self) -> Option<LiveValues> {
        self.state.lock().live.clone()
    }

    fn current_territory_id(&self) -> u16 {
        self.state.lock().territory_id
    }
}

impl SceneHost for FakeHost {
    fn layout_initialized(&self) -> bool {
        self.state.lock().layout_initialized
    }

    fn instances(&self) -> Box<dyn Iterator<Item = SceneInstance> + '_> {
        let instances = self.state.lock().instances.clone();
        Box::new(instances.into_iter())
    }

    fn active_festivals(&self) -> [u32; FESTIVAL_SLOTS] {
        self.state.lock().festivals
    }
}

impl GameData for FakeHost {
    fn territory_path(&self, territory_id: u16) -> Option<String> {
        (territory_id != 0).then(|| format!("ffxiv/bg/territory/{territory_id}"))
    }

    fn song_path(&self, song_id: i32) -> Option<String> {
        (song_id > 0).then(|| format!("music/ffxiv/song_{song_id}.scd"))
    }

    fn current_song_id(&self) -> i32 {
        self.state.lock().song_id
    }
}

/// Poll until `path` exists or two seconds pass.
pub fn wait_for_file(path: &Path) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    path.exists()
}
