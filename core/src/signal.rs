//! Signals raised by the host.
//!
//! The service consumes these through `LocationService::handle`.
//! Variants are appended; never removed or reordered.

use crate::types::{Identity, InstanceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostSignal {
    // ── Session ───────────────────────────────────
    Login {
        identity: Identity,
    },
    Logout,
    TerritoryChanged {
        territory_id: u16,
    },

    // ── Scene ─────────────────────────────────────
    LayoutChanged,
    InstanceActiveChanged {
        instance_id: InstanceId,
        active:      bool,
    },

    // ── Music ─────────────────────────────────────
    SongChanged {
        song_id: i32,
    },
}

impl HostSignal {
    /// Stable name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. }                 => "login",
            Self::Logout                       => "logout",
            Self::TerritoryChanged { .. }      => "territory_changed",
            Self::LayoutChanged                => "layout_changed",
            Self::InstanceActiveChanged { .. } => "instance_active_changed",
            Self::SongChanged { .. }           => "song_changed",
        }
    }
}
