//! # AR Bearing Projection
//!
//! Places fountains on a 2D camera overlay from the user's position and the
//! device compass heading. Horizontal placement is linear in the angle off
//! the heading; vertical placement and icon scale follow a logarithmic
//! closeness curve so nearby fountains sit lower and larger.
//!
//! ```text
//!   -fov/2          heading          +fov/2
//!   x=0 ─────────────  x=0.5  ───────────── x=1
//!        far  ·  (y = far_y, small)
//!        near       ●  (y = near_y, large)
//! ```
//!
//! ## Table of Contents
//! 1. ProjectedMarker / OverlayMarker — Projection output
//! 2. project — Single point projection
//! 3. Projector — Configured projection over a point set
//! 4. select_visible — Nearest-first truncation
//! 5. ArFrame — Per-tick overlay content

use serde::{Deserialize, Serialize};

use crate::config::OverlayOptions;
use crate::coords::{GeoPoint, PointId, PointOfInterest};
use crate::geodesy::{bearing_to, distance_meters, normalize_angle};

// ============================================================================
// 1. ProjectedMarker / OverlayMarker — Projection output
// ============================================================================

/// Screen placement of one point, valid for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedMarker {
    /// Angle off the device heading, in (-180, 180], positive clockwise
    pub relative_angle_deg: f64,
    /// Great-circle distance from the user
    pub distance_m: f64,
    /// Normalised horizontal position, 0 = left edge, 1 = right edge
    pub screen_x: f64,
    /// Normalised vertical position, 0 = top, 1 = bottom
    pub screen_y: f64,
    /// Icon scale factor
    pub scale: f64,
}

/// A projected marker tied to the fountain it represents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMarker {
    pub point: PointId,
    pub name: String,
    pub marker: ProjectedMarker,
}

/// Pixel dimensions of the overlay canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySurface {
    pub width: f64,
    pub height: f64,
}

impl OverlaySurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Canvas pixel coordinates of a marker
    pub fn to_pixels(&self, marker: &ProjectedMarker) -> (f64, f64) {
        (marker.screen_x * self.width, marker.screen_y * self.height)
    }
}

// ============================================================================
// 2. project — Single point projection
// ============================================================================

/// Project `poi` for a user at `user` facing `heading_deg`, with default
/// vertical placement. `None` when the point is outside the field of view or
/// farther than `max_distance_m`.
pub fn project(
    user: GeoPoint,
    heading_deg: f64,
    poi: GeoPoint,
    horizontal_fov_deg: f64,
    max_distance_m: f64,
) -> Option<ProjectedMarker> {
    let options = OverlayOptions {
        horizontal_fov_deg,
        max_distance_m,
        ..OverlayOptions::default()
    };
    project_with(user, heading_deg, poi, &options)
}

fn project_with(user: GeoPoint, heading_deg: f64, poi: GeoPoint, options: &OverlayOptions) -> Option<ProjectedMarker> {
    let fov = options.horizontal_fov_deg;
    if !user.is_valid() || !poi.is_valid() || !heading_deg.is_finite() || !(fov > 0.0 && fov.is_finite()) {
        return None;
    }

    let distance_m = distance_meters(user, poi);
    // Also rejects a NaN limit
    if !(distance_m <= options.max_distance_m) {
        return None;
    }

    let relative_angle_deg = normalize_angle(bearing_to(user, poi) - heading_deg);
    if relative_angle_deg.abs() > fov / 2.0 {
        return None;
    }

    let t = closeness(distance_m, options.max_distance_m);
    Some(ProjectedMarker {
        relative_angle_deg,
        distance_m,
        screen_x: 0.5 + relative_angle_deg / fov,
        screen_y: options.far_y + (options.near_y - options.far_y) * t,
        scale: options.far_scale + (options.near_scale - options.far_scale) * t,
    })
}

/// 1 at the viewer, 0 at `max_distance_m`, logarithmic in between
fn closeness(distance_m: f64, max_distance_m: f64) -> f64 {
    if max_distance_m <= 0.0 {
        return 1.0;
    }
    (1.0 - distance_m.ln_1p() / max_distance_m.ln_1p()).clamp(0.0, 1.0)
}

// ============================================================================
// 3. Projector — Configured projection over a point set
// ============================================================================

/// Projection with a fixed [`OverlayOptions`]
#[derive(Debug, Clone, Default)]
pub struct Projector {
    options: OverlayOptions,
}

impl Projector {
    pub fn new(options: OverlayOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OverlayOptions {
        &self.options
    }

    /// Project one point
    pub fn project(&self, user: GeoPoint, heading_deg: f64, poi: GeoPoint) -> Option<ProjectedMarker> {
        project_with(user, heading_deg, poi, &self.options)
    }

    /// Project every point, keeping those in view. O(points).
    pub fn project_all(&self, user: GeoPoint, heading_deg: f64, points: &[PointOfInterest]) -> Vec<OverlayMarker> {
        points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                self.project(user, heading_deg, p.position).map(|marker| OverlayMarker {
                    point: PointId(i as u32),
                    name: p.display_name().to_string(),
                    marker,
                })
            })
            .collect()
    }

    /// Everything the overlay draws for one heading update
    pub fn frame(&self, user: GeoPoint, heading_deg: f64, points: &[PointOfInterest]) -> ArFrame {
        let markers = select_visible(self.project_all(user, heading_deg, points), self.options.nearest_limit);
        let nearest_distance_m = markers.first().map(|m| m.marker.distance_m);
        ArFrame {
            heading_deg,
            markers,
            nearest_distance_m,
        }
    }
}

// ============================================================================
// 4. select_visible — Nearest-first truncation
// ============================================================================

/// Sort by ascending distance (ties by point id) and keep the first `limit`.
pub fn select_visible(candidates: impl IntoIterator<Item = OverlayMarker>, limit: usize) -> Vec<OverlayMarker> {
    let mut markers: Vec<OverlayMarker> = candidates.into_iter().collect();
    markers.sort_by(|a, b| {
        a.marker
            .distance_m
            .total_cmp(&b.marker.distance_m)
            .then(a.point.cmp(&b.point))
    });
    markers.truncate(limit);
    markers
}

// ============================================================================
// 5. ArFrame — Per-tick overlay content
// ============================================================================

/// Overlay content for one heading update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArFrame {
    /// Heading the frame was computed for
    pub heading_deg: f64,
    /// Nearest visible markers, closest first
    pub markers: Vec<OverlayMarker>,
    /// Distance to the nearest fountain in view
    pub nearest_distance_m: Option<f64>,
}

impl ArFrame {
    /// Info line shown under the overlay
    pub fn status_line(&self) -> Option<String> {
        self.nearest_distance_m
            .map(|d| format!("{} m to nearest water", d.round() as u64))
    }
}
