//! # Coordinates
//!
//! Geographic primitives shared by the clustering and projection engines, and
//! the Web Mercator transform used to measure screen-space separation.
//!
//! ## Pipeline
//! ```text
//! Geographic (WGS84)  →  Normalised Mercator  →  Screen pixels at zoom z
//!   lat/lon degrees        x/y in [0, 1]            x·tile_size·2^z
//! ```
//!
//! ## Table of Contents
//! 1. GeoPoint — Validated WGS84 position
//! 2. PointOfInterest — Fountain record
//! 3. BoundingBox / Viewport — Map view extents
//! 4. Web Mercator transforms
//! 5. geo crate interop

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, Result};

// ============================================================================
// 1. GeoPoint — Validated WGS84 position
// ============================================================================

/// A WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in [-90, 90]
    pub latitude: f64,
    /// Longitude in [-180, 180]
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point without validation
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Whether both components are finite and within WGS84 range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Reject the whole set on the first malformed point.
pub fn validate_points(points: &[PointOfInterest]) -> Result<()> {
    match points.iter().position(|p| !p.position.is_valid()) {
        Some(index) => {
            let bad = points[index].position;
            Err(GeoError::InvalidInput {
                index,
                latitude: bad.latitude,
                longitude: bad.longitude,
            })
        }
        None => Ok(()),
    }
}

// ============================================================================
// 2. PointOfInterest — Fountain record
// ============================================================================

/// Index of a point within the loaded point set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(pub u32);

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Label used when a fountain carries no `name` tag
pub const DEFAULT_POINT_NAME: &str = "Drinking water";

/// A drinking-water fountain as read from the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// Geographic position
    pub position: GeoPoint,
    /// Human-readable name (OSM `name` tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source element id (OSM node/way/relation id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
}

impl PointOfInterest {
    /// Unnamed point at a position
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: GeoPoint::new(latitude, longitude),
            name: None,
            osm_id: None,
        }
    }

    /// Attach a name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a source element id
    pub fn with_osm_id(mut self, id: i64) -> Self {
        self.osm_id = Some(id);
        self
    }

    /// Name for labels and popups
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_POINT_NAME)
    }
}

// ============================================================================
// 3. BoundingBox / Viewport — Map view extents
// ============================================================================

/// Axis-aligned geographic box in degrees.
///
/// `west > east` denotes a box that crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// The whole world
    pub const fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn is_finite(&self) -> bool {
        self.west.is_finite() && self.south.is_finite() && self.east.is_finite() && self.north.is_finite()
    }

    /// Split into at most two non-wrapping longitude ranges with clamped
    /// latitudes, as `(west, south, east, north)` tuples.
    ///
    /// Both edges are wrapped into [-180, 180), the space indexed points live
    /// in, so an edge on the antimeridian always lands on -180.
    pub(crate) fn normalized_ranges(&self) -> Vec<(f64, f64, f64, f64)> {
        let south = self.south.clamp(-90.0, 90.0);
        let north = self.north.clamp(-90.0, 90.0);
        if self.east - self.west >= 360.0 {
            return vec![(-180.0, south, 180.0, north)];
        }
        let west = wrap_longitude(self.west);
        let east = wrap_longitude(self.east);
        if west > east {
            vec![(west, south, 180.0, north), (-180.0, south, east, north)]
        } else {
            vec![(west, south, east, north)]
        }
    }
}

/// Map display state: visible extent plus integer zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: BoundingBox,
    pub zoom: u8,
}

impl Viewport {
    pub const fn new(bounds: BoundingBox, zoom: u8) -> Self {
        Self { bounds, zoom }
    }
}

/// Wrap any longitude into [-180, 180)
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

// ============================================================================
// 4. Web Mercator transforms
// ============================================================================

/// Longitude → normalised Mercator x in [0, 1]
pub fn lon_to_x(lon: f64) -> f64 {
    lon / 360.0 + 0.5
}

/// Latitude → normalised Mercator y in [0, 1] (north at 0).
/// Latitudes beyond ±85.05° clamp to the edges.
pub fn lat_to_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    // ±inf at the poles, clamped below
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / std::f64::consts::PI;
    y.clamp(0.0, 1.0)
}

/// Normalised Mercator x → longitude
pub fn x_to_lon(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Normalised Mercator y → latitude
pub fn y_to_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0).to_radians();
    360.0 * y2.exp().atan() / std::f64::consts::PI - 90.0
}

/// Screen pixels at `zoom` expressed in normalised Mercator units
pub fn pixels_to_mercator(pixels: f64, tile_size: u32, zoom: u8) -> f64 {
    pixels / (tile_size as f64 * 2f64.powi(zoom as i32))
}

// ============================================================================
// 5. geo crate interop
// ============================================================================

impl From<GeoPoint> for geo::Coord<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::coord! { x: p.longitude, y: p.latitude }
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(p: geo::Point<f64>) -> Self {
        GeoPoint::new(p.y(), p.x())
    }
}
