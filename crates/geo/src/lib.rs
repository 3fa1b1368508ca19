//! # Waterfinder Geo — Fountain Clustering and AR Bearing Projection
//!
//! Core engine behind the drinking-water finder. Clusters large fountain sets
//! for slippy-map display and places nearby fountains on a camera overlay from
//! the device's position and compass heading.
//!
//! ## Architecture
//! - `waterfinder.toml` — Clustering and overlay tunables
//! - Overpass JSON / GeoJSON dumps — Fountain locations
//! - One R-tree per zoom level, built once, queried per viewport
//!
//! ## Modules
//! - `config` — Parse `waterfinder.toml`
//! - `coords` — Points, bounding boxes, Web Mercator transforms
//! - `geodesy` — Great-circle bearing and haversine distance
//! - `spatial_index` — R-tree wrapper for per-level queries
//! - `cluster` — Zoom-level cluster hierarchy
//! - `projection` — Heading-relative screen placement
//! - `heading` — Compass sensor seam and listener hub
//! - `overlay` — AR overlay lifecycle
//! - `context` — Versioned shared point snapshots
//! - `worker` — Cluster index on a dedicated thread
//! - `vector_import` — Overpass / GeoJSON → points
//!
//! ## Table of Contents
//! 1. Module declarations
//! 2. Re-exports
//! 3. Prelude

pub mod cluster;
pub mod config;
pub mod context;
pub mod coords;
pub mod error;
pub mod geodesy;
pub mod heading;
pub mod overlay;
pub mod projection;
mod spatial_index;
pub mod vector_import;
pub mod worker;

pub use cluster::{ClusterId, ClusterIndex, ClusterNode, ClusterSummary};
pub use config::{ClusterOptions, OverlayOptions, WaterfinderConfig};
pub use context::{PointContext, PointSnapshot};
pub use coords::{BoundingBox, GeoPoint, PointId, PointOfInterest, Viewport};
pub use error::{GeoError, Permission, Result};
pub use geodesy::{bearing_to, distance_meters, normalize_angle};
pub use heading::{HeadingHub, HeadingSensor, HeadingSubscription, LatestHeading};
pub use overlay::{ArOverlay, CameraDevice, CameraStream, OverlayState, UserGesture};
pub use projection::{project, select_visible, ArFrame, OverlayMarker, OverlaySurface, ProjectedMarker, Projector};
pub use vector_import::{import_geojson, overpass_to_geojson, parse_geojson, parse_overpass};
pub use worker::ClusterWorker;

/// Common imports for hosts embedding the engine
pub mod prelude {
    pub use crate::cluster::{ClusterId, ClusterIndex, ClusterNode};
    pub use crate::config::WaterfinderConfig;
    pub use crate::coords::{BoundingBox, GeoPoint, PointOfInterest, Viewport};
    pub use crate::error::{GeoError, Result};
    pub use crate::geodesy::{bearing_to, distance_meters};
    pub use crate::overlay::{ArOverlay, UserGesture};
    pub use crate::projection::{ArFrame, Projector};
}
