use crate::types::Identity;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot load snapshot {}: {source}", path.display())]
    Load {
        path:   PathBuf,
        source: Box<LocationError>,
    },

    #[error("Cannot save snapshot {identity:016X}: {source}")]
    Save {
        identity: Identity,
        source:   Box<LocationError>,
    },

    #[error("Not a snapshot file name: '{name}'")]
    InvalidFileName { name: String },

    #[error("Invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LocationError {
    pub fn load(path: impl Into<PathBuf>, source: LocationError) -> Self {
        Self::Load { path: path.into(), source: Box::new(source) }
    }

    pub fn save(identity: Identity, source: LocationError) -> Self {
        Self::Save { identity, source: Box::new(source) }
    }
}

pub type LocationResult<T> = Result<T, LocationError>;
