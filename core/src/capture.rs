//! Capture pipeline: folds live state into the current identity's snapshot.
//!
//! Runs on the host's live-update thread, once per tick.
//!
//! Scene membership is expensive to enumerate, so it is only recomputed
//! while a refresh is pending. A refresh becomes pending when:
//!   - the host reports a layout change, or
//!   - an instance we already know about flips to a state that disagrees
//!     with the stored snapshot.
//! Instances we have never seen do not by themselves force a refresh.

use crate::{
    config::LocationConfig,
    host::{GameData, LiveStateSource, LiveValues, SceneHost},
    snapshot::{Music, Snapshot, FESTIVAL_SLOTS},
    store::SnapshotStore,
    types::{Identity, InstanceId},
};
use chrono::{DateTime, Timelike};
use std::collections::{BTreeMap, BTreeSet};

/// Result of a full membership enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    pub active:              BTreeSet<InstanceId>,
    pub inactive:            BTreeSet<InstanceId>,
    pub vfx_trigger_indexes: BTreeMap<InstanceId, i16>,
}

/// What a tick does to the snapshot's membership fields.
#[derive(Debug, Clone, PartialEq)]
enum LayoutUpdate {
    Keep,
    Replace {
        membership: Membership,
        festivals:  [u32; FESTIVAL_SLOTS],
    },
    Clear,
}

pub struct CapturePipeline {
    territory_id:    u16,
    territory_path:  Option<String>,
    music:           Music,
    refresh_pending: bool,
    last_identity:   Option<Identity>,
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            territory_id:    0,
            territory_path:  None,
            music:           Music::default(),
            // Nothing captured yet, so the first initialized layout is taken.
            refresh_pending: true,
            last_identity:   None,
        }
    }

    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    /// The identity seen on the most recent tick with a live character.
    pub fn last_identity(&self) -> Option<Identity> {
        self.last_identity
    }

    pub fn territory_path(&self) -> Option<&str> {
        self.territory_path.as_deref()
    }

    pub fn music(&self) -> &Music {
        &self.music
    }

    // ── Signals ───────────────────────────────────────────────

    pub fn on_territory_changed(&mut self, territory_id: u16, data: &dyn GameData) {
        self.territory_id = territory_id;
        self.territory_path = data.territory_path(territory_id);
        log::debug!("Territory changed: {territory_id} -> {:?}", self.territory_path);
    }

    pub fn on_song_changed(&mut self, song_id: i32, data: &dyn GameData) {
        self.music = Music { id: song_id, path: data.song_path(song_id) };
        log::debug!("Song changed: {song_id} {:?}", self.music.path);
    }

    pub fn on_layout_changed(&mut self) {
        self.refresh_pending = true;
    }

    /// Returns true if this signal made a refresh pending.
    pub fn on_instance_active_changed(
        &mut self,
        instance_id: InstanceId,
        active: bool,
        identity: Option<Identity>,
        store: &SnapshotStore,
    ) -> bool {
        if self.refresh_pending {
            return false;
        }
        let Some(identity) = identity.filter(|id| store.contains(*id)) else {
            return false;
        };
        let snapshot = store.get(identity);
        if !state_disagrees(&snapshot, instance_id, active) {
            return false;
        }
        log::debug!(
            "Instance {instance_id} became {} against stored state, refreshing layout",
            if active { "active" } else { "inactive" }
        );
        self.refresh_pending = true;
        true
    }

    // ── Tick ──────────────────────────────────────────────────

    /// Capture one tick. Returns the identity whose snapshot was updated.
    pub fn tick(
        &mut self,
        config: &LocationConfig,
        live: &dyn LiveStateSource,
        scene: &dyn SceneHost,
        store: &SnapshotStore,
    ) -> Option<Identity> {
        if !config.track_player_location {
            return None;
        }
        let identity = live.current_identity()?;
        let values = live.current_live_values()?;
        self.last_identity = Some(identity);

        let Some(territory_path) = self.territory_path.clone() else {
            log::debug!("No territory path, skipping capture");
            return None;
        };

        let layout = self.layout_update(config, scene);
        let music = if config.save_bgm { self.music.clone() } else { Music::disabled() };
        let territory_id = self.territory_id;

        store.merge(identity, |snapshot| {
            snapshot.territory_type_id = territory_id;
            snapshot.territory_path = territory_path;
            apply_live_values(snapshot, &values, config);
            snapshot.set_music(music);
            apply_layout(snapshot, layout, config);
        });
        Some(identity)
    }

    fn layout_update(&mut self, config: &LocationConfig, scene: &dyn SceneHost) -> LayoutUpdate {
        if !config.save_layout {
            return LayoutUpdate::Clear;
        }
        if !scene.layout_initialized() {
            return LayoutUpdate::Keep;
        }
        let update = if self.refresh_pending {
            let mut membership = diff_membership(scene);
            if !config.save_vfx {
                membership.vfx_trigger_indexes.clear();
            }
            let festivals = if config.save_festivals {
                scene.active_festivals()
            } else {
                [0; FESTIVAL_SLOTS]
            };
            LayoutUpdate::Replace { membership, festivals }
        } else {
            LayoutUpdate::Keep
        };
        self.refresh_pending = false;
        update
    }
}

/// True when `instance_id` is known to the snapshot and the reported
/// state contradicts it.
fn state_disagrees(snapshot: &Snapshot, instance_id: InstanceId, active: bool) -> bool {
    let in_active = snapshot.active.contains(&instance_id);
    let in_inactive = snapshot.inactive.contains(&instance_id);
    (in_active || in_inactive) && ((active && !in_active) || (!active && !in_inactive))
}

/// Enumerate the scene and partition every instance by its active flag.
///
/// A full recompute. If the host reports the same id twice the last
/// report wins. Trigger overrides are kept only for active instances.
pub fn diff_membership(scene: &dyn SceneHost) -> Membership {
    let mut membership = Membership::default();
    scene.for_each_instance(&mut |instance| {
        if instance.active {
            membership.inactive.remove(&instance.id);
            membership.active.insert(instance.id);
        } else {
            membership.active.remove(&instance.id);
            membership.inactive.insert(instance.id);
        }
        match instance.trigger_override() {
            Some(index) => {
                membership.vfx_trigger_indexes.insert(instance.id, index);
            }
            None => {
                membership.vfx_trigger_indexes.remove(&instance.id);
            }
        }
    });
    let active = &membership.active;
    membership.vfx_trigger_indexes.retain(|id, _| active.contains(id));
    membership
}

/// Encode an in-world clock reading as `hour * 100 + minute fraction`.
/// 13:30 encodes as 1350.
pub fn eorzea_time_offset(eorzea_seconds: i64) -> u16 {
    let Some(time) = DateTime::from_timestamp(eorzea_seconds, 0) else {
        return 0;
    };
    let hour = time.hour() as u16;
    let fraction = (time.minute() * 100 / 60) as u16;
    hour * 100 + fraction
}

fn apply_live_values(snapshot: &mut Snapshot, values: &LiveValues, config: &LocationConfig) {
    snapshot.position = values.position;
    snapshot.rotation = values.rotation;
    snapshot.weather_id = values.weather_id;
    snapshot.movement_mode = values.movement_mode;

    if config.save_mount {
        snapshot.mount.mount_id = values.mount.mount_id;
        if values.mount.is_mounted() {
            snapshot.mount.buddy_model_top = values.mount.buddy_model_top;
            snapshot.mount.buddy_model_body = values.mount.buddy_model_body;
            snapshot.mount.buddy_model_legs = values.mount.buddy_model_legs;
            snapshot.mount.buddy_stain = values.mount.buddy_stain;
        }
    }

    snapshot.time_offset = if config.save_time {
        eorzea_time_offset(values.eorzea_seconds)
    } else {
        0
    };
}

fn apply_layout(snapshot: &mut Snapshot, layout: LayoutUpdate, config: &LocationConfig) {
    snapshot.save_layout = config.save_layout;
    snapshot.save_festivals = config.save_layout && config.save_festivals;
    snapshot.use_vfx = config.save_layout && config.save_vfx;

    match layout {
        LayoutUpdate::Keep => {}
        LayoutUpdate::Replace { membership, festivals } => {
            snapshot.active = membership.active;
            snapshot.inactive = membership.inactive;
            snapshot.vfx_trigger_indexes = membership.vfx_trigger_indexes;
            snapshot.festivals = festivals;
        }
        LayoutUpdate::Clear => {
            snapshot.active.clear();
            snapshot.inactive.clear();
            snapshot.vfx_trigger_indexes.clear();
            snapshot.festivals = [0; FESTIVAL_SLOTS];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_offset_encodes_hour_and_minute_fraction() {
        // 1970-01-01 13:30:00
        assert_eq!(eorzea_time_offset(13 * 3600 + 30 * 60), 1350);
        assert_eq!(eorzea_time_offset(0), 0);
        // 23:59 -> 2398
        assert_eq!(eorzea_time_offset(23 * 3600 + 59 * 60), 2398);
        // Only the time of day matters.
        assert_eq!(eorzea_time_offset(86_400 * 40 + 6 * 3600), 600);
    }

    #[test]
    fn disagreement_requires_known_instance() {
        let mut snapshot = Snapshot::default();
        snapshot.active.insert(1);
        snapshot.inactive.insert(2);
        assert!(!state_disagrees(&snapshot, 1, true));
        assert!(state_disagrees(&snapshot, 1, false));
        assert!(state_disagrees(&snapshot, 2, true));
        assert!(!state_disagrees(&snapshot, 2, false));
        assert!(!state_disagrees(&snapshot, 3, true));
        assert!(!state_disagrees(&snapshot, 3, false));
    }
}
