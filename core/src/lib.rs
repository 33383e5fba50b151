//! Location snapshots: capture where a character last stood, keep it in
//! memory, persist it per identity, and upgrade old files on load.

pub mod capture;
pub mod clock;
pub mod config;
pub mod durability;
pub mod error;
pub mod host;
pub mod migration;
pub mod service;
pub mod signal;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::{LocationError, LocationResult};
pub use service::{HostBindings, LocationService};
pub use snapshot::{Snapshot, CURRENT_VERSION};
