//! Collaborator contracts consumed by the capture pipeline.
//!
//! RULE: collaborators hand out plain values. Nothing here holds a
//! reference into the host beyond a single call.

use crate::{
    snapshot::{MountModel, MovementMode, Vec3, FESTIVAL_SLOTS},
    types::{Identity, InstanceId},
};

/// Live readings for the local character, taken once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveValues {
    pub position:       Vec3,
    pub rotation:       f32,
    pub weather_id:     u8,
    pub movement_mode:  MovementMode,
    pub mount:          MountModel,
    /// In-world clock as seconds since the Unix epoch.
    pub eorzea_seconds: i64,
}

/// Source of the local character's live state.
pub trait LiveStateSource {
    /// None while no character is logged in.
    fn current_identity(&self) -> Option<Identity>;

    /// None while no local character object exists.
    fn current_live_values(&self) -> Option<LiveValues>;

    fn current_territory_id(&self) -> u16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Vfx,
    Other,
}

/// Trigger index a VFX instance reports when nothing overrides it.
pub const DEFAULT_TRIGGER_INDEX: i16 = -1;

/// One scene object as reported by the scene host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneInstance {
    pub id:            InstanceId,
    pub active:        bool,
    pub kind:          InstanceKind,
    pub trigger_index: i16,
}

impl SceneInstance {
    pub fn trigger_override(&self) -> Option<i16> {
        (self.kind == InstanceKind::Vfx && self.trigger_index != DEFAULT_TRIGGER_INDEX)
            .then_some(self.trigger_index)
    }
}

/// The scene currently loaded by the host.
pub trait SceneHost {
    fn layout_initialized(&self) -> bool;

    /// Every scene object instance, in host order.
    fn instances(&self) -> Box<dyn Iterator<Item = SceneInstance> + '_>;

    /// Festival ids currently applied to the scene.
    fn active_festivals(&self) -> [u32; FESTIVAL_SLOTS];

    fn for_each_instance(&self, visitor: &mut dyn FnMut(&SceneInstance)) {
        for instance in self.instances() {
            visitor(&instance);
        }
    }
}

/// Static game data lookups and the music player's state.
pub trait GameData {
    /// Scene path of a territory, if the territory has one.
    fn territory_path(&self, territory_id: u16) -> Option<String>;

    fn song_path(&self, song_id: i32) -> Option<String>;

    fn current_song_id(&self) -> i32;
}
