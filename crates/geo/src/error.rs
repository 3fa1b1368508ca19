//! Error types for waterfinder-geo
//!
//! ## Table of Contents
//! 1. GeoError - Main error enum
//! 2. Permission - Which host permission was refused
//! 3. Result type alias

use std::path::PathBuf;
use thiserror::Error;

use crate::cluster::ClusterId;

/// Result type alias for waterfinder-geo operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur in clustering, projection and the AR lifecycle
#[derive(Error, Debug)]
pub enum GeoError {
    /// A point in the input set has non-finite or out-of-range coordinates
    #[error("Invalid coordinates at point {index}: ({latitude}, {longitude})")]
    InvalidInput {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    /// Camera or orientation access refused by the user or platform
    #[error("{0} permission denied")]
    PermissionDenied(Permission),

    /// Orientation sensor is not supported on this platform
    #[error("Orientation sensor unavailable")]
    SensorUnavailable,

    /// Video playback failed after the camera stream was opened
    #[error("Camera playback failed: {0}")]
    Playback(String),

    /// Lifecycle action not allowed in the current overlay state
    #[error("Cannot {action} while overlay is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// Cluster id does not belong to the current index
    #[error("Cluster {0} not found in index")]
    UnknownCluster(ClusterId),

    /// The cluster worker thread has stopped
    #[error("Cluster worker unavailable")]
    WorkerUnavailable,

    /// File I/O error
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML configuration parse error
    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON (Overpass dump) parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GeoJSON parse error
    #[error("GeoJSON error: {0}")]
    GeoJson(String),
}

impl From<geojson::Error> for GeoError {
    fn from(err: geojson::Error) -> Self {
        GeoError::GeoJson(err.to_string())
    }
}

/// Host permission required by the AR overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Device orientation (compass heading)
    Orientation,
    /// Rear-facing camera stream
    Camera,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Orientation => write!(f, "Orientation"),
            Permission::Camera => write!(f, "Camera"),
        }
    }
}
