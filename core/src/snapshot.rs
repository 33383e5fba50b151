//! Snapshot schema: the versioned record of where and how a character
//! was last situated.
//!
//! Two shapes live here:
//!   - `StoredRecord`: the persisted document exactly as read from disk.
//!     Every field is optional because older schema versions lack them.
//!   - `Snapshot`: the canonical in-memory value. Built from a record by
//!     `Snapshot::from_record` after migration, never edited field-by-field
//!     by anything but a store merge.
//!
//! RULE: every `Snapshot` in memory satisfies
//!   - `active ∩ inactive = ∅`
//!   - `vfx_trigger_indexes.keys ⊆ active`
//!   - `version == CURRENT_VERSION` (unless read from a newer schema)

use crate::types::{InstanceId, SchemaVersion};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Schema version written by this build.
/// v1 = position, territory, weather, time, music, mount, layout
/// v2 = location_type
/// v3 = ui_color
/// v4 = save_festivals / save_layout / use_vfx toggles
/// v5 = title_screen_movie
pub const CURRENT_VERSION: SchemaVersion = 5;

/// Version assumed for documents that carry no `Version` field.
pub const LEGACY_VERSION: SchemaVersion = 1;

pub const FESTIVAL_SLOTS: usize = 4;

pub const DEFAULT_TERRITORY_PATH: &str = "ffxiv/zon_z1/chr/z1c1/level/z1c1";
pub const DEFAULT_BGM_PATH: &str = "music/ffxiv/BGM_System_Chara.scd";
pub const DEFAULT_WEATHER_ID: u8 = 2;

// ── Value objects ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationType {
    TitleScreen,
    #[default]
    CharacterSelect,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum UiColor {
    ARealmReborn,
    Heavensward,
    Stormblood,
    Shadowbringers,
    Endwalker,
    #[default]
    Dawntrail,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TitleScreenMovie {
    #[default]
    Unspecified,
    ARealmReborn,
    Heavensward,
    Stormblood,
    Shadowbringers,
    Endwalker,
    Dawntrail,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MovementMode {
    #[default]
    Normal,
    Flying,
}

/// Enums the legacy writer stored by declaration index rather than by name.
pub trait IndexedEnum: Copy + Sized + 'static {
    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    fn from_index(index: u64) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::VARIANTS.get(i).copied())
    }
}

impl IndexedEnum for LocationType {
    const VARIANTS: &'static [Self] = &[Self::TitleScreen, Self::CharacterSelect];
}

impl IndexedEnum for UiColor {
    const VARIANTS: &'static [Self] = &[
        Self::ARealmReborn,
        Self::Heavensward,
        Self::Stormblood,
        Self::Shadowbringers,
        Self::Endwalker,
        Self::Dawntrail,
    ];
}

impl IndexedEnum for TitleScreenMovie {
    const VARIANTS: &'static [Self] = &[
        Self::Unspecified,
        Self::ARealmReborn,
        Self::Heavensward,
        Self::Stormblood,
        Self::Shadowbringers,
        Self::Endwalker,
        Self::Dawntrail,
    ];
}

impl IndexedEnum for MovementMode {
    const VARIANTS: &'static [Self] = &[Self::Normal, Self::Flying];
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexOrName<T> {
    Index(u64),
    Name(T),
}

/// Read an optional enum written either as its variant name or as its index.
fn index_or_name<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: IndexedEnum + Deserialize<'de>,
{
    match Option::<IndexOrName<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IndexOrName::Name(value)) => Ok(Some(value)),
        Some(IndexOrName::Index(index)) => T::from_index(index)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("enum index {index} out of range"))),
    }
}

/// Mount appearance. `mount_id == 0` means no mount.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountModel {
    pub mount_id:         u32,
    pub buddy_model_top:  u32,
    pub buddy_model_body: u32,
    pub buddy_model_legs: u32,
    pub buddy_stain:      u8,
}

impl MountModel {
    pub fn is_mounted(&self) -> bool {
        self.mount_id != 0
    }
}

/// Background music selection.
///
/// `Music::disabled()` (id -1, no path) means "play nothing",
/// which is different from the default snapshot's music.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Music {
    pub id:   i32,
    pub path: Option<String>,
}

impl Music {
    pub const DISABLED_ID: i32 = -1;

    pub fn disabled() -> Self {
        Self { id: Self::DISABLED_ID, path: None }
    }

    pub fn is_disabled(&self) -> bool {
        self.id == Self::DISABLED_ID && self.path.is_none()
    }
}

impl Default for Music {
    fn default() -> Self {
        Self { id: 0, path: Some(DEFAULT_BGM_PATH.to_string()) }
    }
}

// ── Canonical snapshot ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    pub version:             SchemaVersion,
    pub location_type:       LocationType,
    pub territory_path:      String,
    pub territory_type_id:   u16,
    pub position:            Vec3,
    /// Radians, stored exactly as captured.
    pub rotation:            f32,
    pub weather_id:          u8,
    /// `hour * 100 + minute fraction`, 0..2400. Zero when time is not captured.
    pub time_offset:         u16,
    pub bgm_id:              i32,
    pub bgm_path:            Option<String>,
    pub movement_mode:       MovementMode,
    pub mount:               MountModel,
    pub active:              BTreeSet<InstanceId>,
    pub inactive:            BTreeSet<InstanceId>,
    pub vfx_trigger_indexes: BTreeMap<InstanceId, i16>,
    pub festivals:           [u32; FESTIVAL_SLOTS],
    pub ui_color:            UiColor,
    pub title_screen_movie:  TitleScreenMovie,
    pub save_festivals:      bool,
    pub save_layout:         bool,
    pub use_vfx:             bool,
}

impl Default for Snapshot {
    /// The built-in fallback location used for identities with no record.
    fn default() -> Self {
        let music = Music::default();
        Self {
            version:             CURRENT_VERSION,
            location_type:       LocationType::CharacterSelect,
            territory_path:      DEFAULT_TERRITORY_PATH.to_string(),
            territory_type_id:   0,
            position:            Vec3::ZERO,
            rotation:            0.0,
            weather_id:          DEFAULT_WEATHER_ID,
            time_offset:         0,
            bgm_id:              music.id,
            bgm_path:            music.path,
            movement_mode:       MovementMode::Normal,
            mount:               MountModel::default(),
            active:              BTreeSet::new(),
            inactive:            BTreeSet::new(),
            vfx_trigger_indexes: BTreeMap::new(),
            festivals:           [0; FESTIVAL_SLOTS],
            ui_color:            UiColor::Dawntrail,
            title_screen_movie:  TitleScreenMovie::Unspecified,
            save_festivals:      false,
            save_layout:         false,
            use_vfx:             false,
        }
    }
}

impl Snapshot {
    pub fn music(&self) -> Music {
        Music { id: self.bgm_id, path: self.bgm_path.clone() }
    }

    pub fn set_music(&mut self, music: Music) {
        self.bgm_id = music.id;
        self.bgm_path = music.path;
    }

    pub fn has_festival_override(&self) -> bool {
        self.festivals.iter().any(|f| *f != 0)
    }

    /// True when both membership invariants hold.
    pub fn membership_is_consistent(&self) -> bool {
        self.active.is_disjoint(&self.inactive)
            && self.vfx_trigger_indexes.keys().all(|id| self.active.contains(id))
    }

    /// Restore the membership invariants.
    ///
    /// An id claimed by both sets is dropped from both, falling back to the
    /// host default. Trigger overrides for ids that are not active are pruned.
    pub fn canonicalize(&mut self) {
        let conflicted: Vec<InstanceId> =
            self.active.intersection(&self.inactive).copied().collect();
        for id in conflicted {
            self.active.remove(&id);
            self.inactive.remove(&id);
        }
        let active = &self.active;
        self.vfx_trigger_indexes.retain(|id, _| active.contains(id));
    }

    /// Build the canonical value from an already-migrated record.
    /// Absent fields take their value from the default snapshot.
    pub fn from_record(record: StoredRecord) -> Self {
        let fallback = Snapshot::default();
        let version = record.effective_version();
        let music = match record.bgm_id {
            Some(id) => Music { id, path: record.bgm_path },
            None => fallback.music(),
        };
        let mut snapshot = Self {
            version,
            location_type:       record.location_type.unwrap_or(fallback.location_type),
            territory_path:      record.territory_path.unwrap_or(fallback.territory_path),
            territory_type_id:   record.territory_type_id.unwrap_or(fallback.territory_type_id),
            position:            record.position.unwrap_or(fallback.position),
            rotation:            record.rotation.unwrap_or(fallback.rotation),
            weather_id:          record.weather_id.unwrap_or(fallback.weather_id),
            time_offset:         record.time_offset.unwrap_or(fallback.time_offset),
            bgm_id:              music.id,
            bgm_path:            music.path,
            movement_mode:       record.movement_mode.unwrap_or(fallback.movement_mode),
            mount:               record.mount.unwrap_or(fallback.mount),
            active:              record.active.unwrap_or_default(),
            inactive:            record.inactive.unwrap_or_default(),
            vfx_trigger_indexes: record.vfx_trigger_indexes.unwrap_or_default(),
            festivals:           festival_slots(record.festivals.as_deref()),
            ui_color:            record.ui_color.unwrap_or(fallback.ui_color),
            title_screen_movie:  record.title_screen_movie.unwrap_or(fallback.title_screen_movie),
            save_festivals:      record.save_festivals.unwrap_or(false),
            save_layout:         record.save_layout.unwrap_or(false),
            use_vfx:             record.use_vfx.unwrap_or(false),
        };
        snapshot.canonicalize();
        snapshot
    }

    /// Rotation in degrees normalised to [0, 360). Display only.
    pub fn rotation_degrees(&self) -> f32 {
        self.rotation.to_degrees().rem_euclid(360.0)
    }

    /// The captured in-world clock as (hour, minute). Display only.
    pub fn time_of_day(&self) -> (u16, u16) {
        let hour = self.time_offset / 100;
        let minute = (self.time_offset % 100) * 60 / 100;
        (hour, minute)
    }
}

/// Pad or truncate a persisted festival list into the fixed slot array.
fn festival_slots(stored: Option<&[u32]>) -> [u32; FESTIVAL_SLOTS] {
    let mut slots = [0; FESTIVAL_SLOTS];
    if let Some(stored) = stored {
        for (slot, value) in slots.iter_mut().zip(stored) {
            *slot = *value;
        }
    }
    slots
}

// ── Persisted record ───────────────────────────────────────────

/// The on-disk document. Unknown keys are ignored; `null` and absent
/// fields both read as `None`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct StoredRecord {
    #[serde(default = "legacy_version")]
    pub version:             i64,
    #[serde(deserialize_with = "index_or_name")]
    pub location_type:       Option<LocationType>,
    pub territory_path:      Option<String>,
    pub territory_type_id:   Option<u16>,
    pub position:            Option<Vec3>,
    pub rotation:            Option<f32>,
    pub weather_id:          Option<u8>,
    pub time_offset:         Option<u16>,
    pub bgm_id:              Option<i32>,
    pub bgm_path:            Option<String>,
    #[serde(deserialize_with = "index_or_name")]
    pub movement_mode:       Option<MovementMode>,
    pub mount:               Option<MountModel>,
    pub active:              Option<BTreeSet<InstanceId>>,
    pub inactive:            Option<BTreeSet<InstanceId>>,
    pub vfx_trigger_indexes: Option<BTreeMap<InstanceId, i16>>,
    pub festivals:           Option<Vec<u32>>,
    #[serde(deserialize_with = "index_or_name")]
    pub ui_color:            Option<UiColor>,
    #[serde(deserialize_with = "index_or_name")]
    pub title_screen_movie:  Option<TitleScreenMovie>,
    pub save_festivals:      Option<bool>,
    pub save_layout:         Option<bool>,
    pub use_vfx:             Option<bool>,
}

fn legacy_version() -> i64 {
    i64::from(LEGACY_VERSION)
}

impl StoredRecord {
    /// The stored version, with anything below 1 read as 1.
    pub fn effective_version(&self) -> SchemaVersion {
        SchemaVersion::try_from(self.version.max(i64::from(LEGACY_VERSION)))
            .unwrap_or(SchemaVersion::MAX)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
