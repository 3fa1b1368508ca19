//! # Waterfinder Configuration
//!
//! Parses `waterfinder.toml`, the tunables for the clustering engine and the AR
//! overlay. Every field has a default, so an empty file is a valid config.
//!
//! ```toml
//! [cluster]
//! radius_px = 80
//! disable_clustering_above_zoom = 19
//!
//! [overlay]
//! horizontal_fov_deg = 75.0
//! max_distance_m = 1000.0
//! nearest_limit = 3
//! ```
//!
//! ## Table of Contents
//! 1. WaterfinderConfig — Top-level config
//! 2. ClusterOptions — Clustering engine tunables
//! 3. OverlayOptions — AR projection tunables
//! 4. Parsing

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GeoError, Result};

// ============================================================================
// 1. WaterfinderConfig — Top-level config
// ============================================================================

/// Top-level configuration, parsed from `waterfinder.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterfinderConfig {
    /// Map clustering
    #[serde(default)]
    pub cluster: ClusterOptions,
    /// AR overlay projection
    #[serde(default)]
    pub overlay: OverlayOptions,
}

// ============================================================================
// 2. ClusterOptions — Clustering engine tunables
// ============================================================================

/// Clustering engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    /// Marker footprint radius in screen pixels. Two nodes merge when their
    /// footprints would overlap, i.e. centres closer than `2 * radius_px`.
    #[serde(default = "default_radius_px")]
    pub radius_px: f64,
    /// Pixel width of one map tile
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Coarsest zoom level precomputed
    #[serde(default)]
    pub min_zoom: u8,
    /// At `zoom >=` this value queries return raw points
    #[serde(default = "default_disable_clustering_above_zoom")]
    pub disable_clustering_above_zoom: u8,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius_px: default_radius_px(),
            tile_size: default_tile_size(),
            min_zoom: 0,
            disable_clustering_above_zoom: default_disable_clustering_above_zoom(),
        }
    }
}

impl ClusterOptions {
    /// Set the footprint radius
    pub fn with_radius(mut self, radius_px: f64) -> Self {
        self.radius_px = radius_px;
        self
    }

    /// Set the zoom at which clustering switches off
    pub fn with_disable_clustering_above_zoom(mut self, zoom: u8) -> Self {
        self.disable_clustering_above_zoom = zoom;
        self
    }

    /// Finest zoom that is still clustered
    pub fn max_cluster_zoom(&self) -> u8 {
        self.disable_clustering_above_zoom.saturating_sub(1).max(self.min_zoom)
    }

    /// Repair values that would make the level hierarchy meaningless.
    pub(crate) fn sanitized(&self) -> Self {
        let radius_px = if self.radius_px.is_finite() && self.radius_px >= 0.0 {
            self.radius_px
        } else {
            default_radius_px()
        };
        // 32 keeps 2^z exact in f64. `disable == min_zoom` leaves only the
        // raw level, so every query returns leaves.
        let min_zoom = self.min_zoom.min(32);
        Self {
            radius_px,
            tile_size: self.tile_size.max(1),
            min_zoom,
            disable_clustering_above_zoom: self.disable_clustering_above_zoom.clamp(min_zoom, 32),
        }
    }
}

fn default_radius_px() -> f64 { 80.0 }
fn default_tile_size() -> u32 { 256 }
fn default_disable_clustering_above_zoom() -> u8 { 19 }

// ============================================================================
// 3. OverlayOptions — AR projection tunables
// ============================================================================

/// AR overlay projection configuration.
///
/// Vertical placement and scale interpolate between the `far_*` values (at
/// `max_distance_m`) and the `near_*` values (at the viewer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayOptions {
    /// Horizontal camera field of view in degrees
    #[serde(default = "default_fov")]
    pub horizontal_fov_deg: f64,
    /// Points farther than this are never drawn
    #[serde(default = "default_max_distance")]
    pub max_distance_m: f64,
    /// How many of the nearest visible points to draw
    #[serde(default = "default_nearest_limit")]
    pub nearest_limit: usize,
    /// Normalised screen y for a point at the viewer (0 = top)
    #[serde(default = "default_near_y")]
    pub near_y: f64,
    /// Normalised screen y for a point at `max_distance_m`
    #[serde(default = "default_far_y")]
    pub far_y: f64,
    /// Icon scale at the viewer
    #[serde(default = "default_near_scale")]
    pub near_scale: f64,
    /// Icon scale at `max_distance_m`
    #[serde(default = "default_far_scale")]
    pub far_scale: f64,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            horizontal_fov_deg: default_fov(),
            max_distance_m: default_max_distance(),
            nearest_limit: default_nearest_limit(),
            near_y: default_near_y(),
            far_y: default_far_y(),
            near_scale: default_near_scale(),
            far_scale: default_far_scale(),
        }
    }
}

fn default_fov() -> f64 { 75.0 }
fn default_max_distance() -> f64 { 1000.0 }
fn default_nearest_limit() -> usize { 3 }
fn default_near_y() -> f64 { 0.85 }
fn default_far_y() -> f64 { 0.45 }
fn default_near_scale() -> f64 { 1.5 }
fn default_far_scale() -> f64 { 0.5 }

// ============================================================================
// 4. Parsing
// ============================================================================

impl WaterfinderConfig {
    /// Load a config from a `waterfinder.toml` file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GeoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
