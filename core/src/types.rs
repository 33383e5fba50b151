//! Shared primitive types used across the location subsystem.

/// Stable 64-bit identifier of a character. Snapshot cache key.
pub type Identity = u64;

/// Schema version stamped on every persisted snapshot.
pub type SchemaVersion = u32;

/// Identifier of a scene object instance reported by the scene host.
pub type InstanceId = u64;

/// Extension of every persisted snapshot file.
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Render an identity the way it appears on disk: 16 uppercase hex digits.
pub fn identity_hex(identity: Identity) -> String {
    format!("{identity:016X}")
}

/// File name of the snapshot belonging to `identity`.
pub fn snapshot_file_name(identity: Identity) -> String {
    format!("{}.{SNAPSHOT_EXTENSION}", identity_hex(identity))
}

/// Parse a snapshot file name back into its identity.
/// Accepts either hex case; anything else returns None.
pub fn parse_snapshot_file_name(name: &str) -> Option<Identity> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(SNAPSHOT_EXTENSION) || stem.len() != 16 {
        return None;
    }
    if !stem.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(stem, 16).ok()
}
