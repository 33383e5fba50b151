//! Schema migration chain.
//!
//! RULE: each step upgrades a record by exactly one version and is pure.
//! Steps only fill fields the record does not already carry, so a record
//! written by a newer build is never regressed by an older step.
//!
//! Upgrading runs every step from the stored version up to
//! `CURRENT_VERSION - 1` in order. There is no skip-ahead.

use crate::{
    error::LocationResult,
    snapshot::{
        LocationType, Snapshot, StoredRecord, TitleScreenMovie, UiColor, CURRENT_VERSION,
        FESTIVAL_SLOTS, LEGACY_VERSION,
    },
    types::SchemaVersion,
};

type MigrationStep = fn(StoredRecord) -> StoredRecord;

/// `STEPS[i]` upgrades version `i + 1` to `i + 2`.
/// Append only. One entry per schema bump.
const STEPS: [MigrationStep; 4] = [v1_to_v2, v2_to_v3, v3_to_v4, v4_to_v5];

/// A decoded, upgraded and canonicalized snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub snapshot:     Snapshot,
    pub from_version: SchemaVersion,
    pub changed:      bool,
}

/// Upgrade `record` to the current version.
/// Returns the record and whether any step ran.
pub fn migrate(mut record: StoredRecord) -> (StoredRecord, bool) {
    let from = record.effective_version();
    if from > CURRENT_VERSION {
        log::warn!(
            "Location record has version {from}, newer than supported {CURRENT_VERSION}; leaving as is"
        );
        return (record, false);
    }

    let mut changed = false;
    let mut version = from;
    while version < CURRENT_VERSION {
        let Some(step) = step_index(version).and_then(|i| STEPS.get(i)) else {
            break;
        };
        record = step(record);
        version = record.effective_version();
        changed = true;
    }
    (record, changed)
}

/// Parse, upgrade and canonicalize a persisted document.
pub fn decode(text: &str) -> LocationResult<Migrated> {
    let record = StoredRecord::from_json(text)?;
    let from_version = record.effective_version();
    let (record, changed) = migrate(record);
    Ok(Migrated {
        snapshot: Snapshot::from_record(record),
        from_version,
        changed,
    })
}

fn step_index(version: SchemaVersion) -> Option<usize> {
    usize::try_from(version.checked_sub(LEGACY_VERSION)?).ok()
}

fn stamp(record: &mut StoredRecord, version: SchemaVersion) {
    log::info!("Migrating location to v{version}");
    record.version = i64::from(version);
}

// ── Steps ──────────────────────────────────────────────────────

/// Records from before title-screen support were all character-select scenes.
fn v1_to_v2(mut record: StoredRecord) -> StoredRecord {
    stamp(&mut record, 2);
    record.location_type.get_or_insert(LocationType::CharacterSelect);
    record
}

fn v2_to_v3(mut record: StoredRecord) -> StoredRecord {
    stamp(&mut record, 3);
    record.ui_color.get_or_insert(UiColor::Dawntrail);
    record
}

/// Feature toggles did not exist before v4; infer them from captured data.
/// An intentionally empty layout reads the same as a disabled one.
fn v3_to_v4(mut record: StoredRecord) -> StoredRecord {
    stamp(&mut record, 4);
    let festivals = record.festivals.get_or_insert_with(|| vec![0; FESTIVAL_SLOTS]);
    let has_festivals = festivals.len() == FESTIVAL_SLOTS && festivals.iter().any(|f| *f != 0);
    let active = record.active.get_or_insert_with(Default::default);
    let inactive = record.inactive.get_or_insert_with(Default::default);
    let has_layout = !active.is_empty() || !inactive.is_empty();
    record.vfx_trigger_indexes.get_or_insert_with(Default::default);

    record.save_festivals.get_or_insert(has_festivals);
    record.save_layout.get_or_insert(has_layout);
    record.use_vfx.get_or_insert(has_layout);
    record
}

fn v4_to_v5(mut record: StoredRecord) -> StoredRecord {
    stamp(&mut record, 5);
    record.title_screen_movie.get_or_insert(TitleScreenMovie::Unspecified);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> StoredRecord {
        StoredRecord::from_json(json).unwrap()
    }

    #[test]
    fn chain_covers_every_version_below_current() {
        for version in LEGACY_VERSION..CURRENT_VERSION {
            let index = step_index(version).unwrap();
            assert!(index < STEPS.len(), "no step for v{version}");
        }
    }

    #[test]
    fn v1_to_v2_stamps_character_select() {
        let out = v1_to_v2(record(r#"{"Version":1}"#));
        assert_eq!(out.version, 2);
        assert_eq!(out.location_type, Some(LocationType::CharacterSelect));
    }

    #[test]
    fn v1_to_v2_keeps_existing_location_type() {
        let out = v1_to_v2(record(r#"{"Version":1,"LocationType":"TitleScreen"}"#));
        assert_eq!(out.location_type, Some(LocationType::TitleScreen));
    }

    #[test]
    fn v2_to_v3_stamps_ui_color() {
        let out = v2_to_v3(record(r#"{"Version":2}"#));
        assert_eq!(out.version, 3);
        assert_eq!(out.ui_color, Some(UiColor::Dawntrail));
    }

    #[test]
    fn v3_to_v4_backfills_collections() {
        let out = v3_to_v4(record(r#"{"Version":3}"#));
        assert_eq!(out.version, 4);
        assert_eq!(out.festivals, Some(vec![0; FESTIVAL_SLOTS]));
        assert_eq!(out.active.as_ref().map(|s| s.len()), Some(0));
        assert_eq!(out.inactive.as_ref().map(|s| s.len()), Some(0));
        assert_eq!(out.vfx_trigger_indexes.as_ref().map(|m| m.len()), Some(0));
        assert_eq!(out.save_festivals, Some(false));
        assert_eq!(out.save_layout, Some(false));
        assert_eq!(out.use_vfx, Some(false));
    }

    #[test]
    fn v3_to_v4_infers_toggles_from_data() {
        let out = v3_to_v4(record(r#"{"Version":3,"Festivals":[0,12,0,0],"Inactive":[9]}"#));
        assert_eq!(out.save_festivals, Some(true));
        assert_eq!(out.save_layout, Some(true));
        assert_eq!(out.use_vfx, Some(true));
    }

    #[test]
    fn v3_to_v4_ignores_festivals_of_wrong_length() {
        let out = v3_to_v4(record(r#"{"Version":3,"Festivals":[5,5]}"#));
        assert_eq!(out.save_festivals, Some(false));
    }

    #[test]
    fn v4_to_v5_stamps_movie() {
        let out = v4_to_v5(record(r#"{"Version":4}"#));
        assert_eq!(out.version, 5);
        assert_eq!(out.title_screen_movie, Some(TitleScreenMovie::Unspecified));
    }

    #[test]
    fn current_record_is_unchanged() {
        let input = record(r#"{"Version":5,"TerritoryPath":"x"}"#);
        let (out, changed) = migrate(input.clone());
        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn newer_record_passes_through() {
        let input = record(r#"{"Version":9}"#);
        let (out, changed) = migrate(input.clone());
        assert!(!changed);
        assert_eq!(out.version, 9);
    }
}
