//! # Spatial Clustering
//!
//! Hierarchical greedy clustering of fountains for map display. Levels are
//! precomputed from the raw-point level (`disable_clustering_above_zoom`)
//! down to `min_zoom`; each coarser level is built by walking the finer
//! level's nodes in order and absorbing every unassigned neighbour whose
//! marker footprint would overlap.
//!
//! ```text
//! zoom 19  ·  ·   ·  ·· ·      raw points
//! zoom 18  ·  ·   ·  (2) ·     footprints overlapping at z18 merge
//!  ...
//! zoom 0        (6)            one node per screen footprint
//! ```
//!
//! ## Table of Contents
//! 1. ClusterId / ClusterNode — Query results
//! 2. ClusterIndex — Level hierarchy
//! 3. Build (greedy agglomeration)
//! 4. Queries (viewport, expansion zoom, children, leaves)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

use crate::config::ClusterOptions;
use crate::coords::{
    lat_to_y, lon_to_x, pixels_to_mercator, validate_points, wrap_longitude, x_to_lon, y_to_lat, BoundingBox,
    GeoPoint, PointId, PointOfInterest, Viewport,
};
use crate::error::{GeoError, Result};
use crate::spatial_index::{IndexedNode, LevelIndex};

// ============================================================================
// 1. ClusterId / ClusterNode — Query results
// ============================================================================

/// Identifier of an aggregate node, valid for the index that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A renderable node: a single fountain or an aggregate of at least two
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterNode {
    /// A single point
    Leaf { id: PointId, point: PointOfInterest },
    /// Two or more points sharing one marker
    Cluster(ClusterSummary),
}

impl ClusterNode {
    /// Number of points represented
    pub fn count(&self) -> usize {
        match self {
            ClusterNode::Leaf { .. } => 1,
            ClusterNode::Cluster(summary) => summary.count,
        }
    }

    /// Marker position
    pub fn position(&self) -> GeoPoint {
        match self {
            ClusterNode::Leaf { point, .. } => point.position,
            ClusterNode::Cluster(summary) => summary.centroid,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ClusterNode::Leaf { .. })
    }
}

/// Aggregate marker details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: ClusterId,
    /// Count-weighted centroid of the members (averaged in Mercator space)
    pub centroid: GeoPoint,
    /// Number of member points, always ≥ 2
    pub count: usize,
    /// Every point folded into this cluster
    pub member_ids: BTreeSet<PointId>,
    /// Zoom at which the members stop sharing this marker
    pub expansion_zoom: u8,
}

// ============================================================================
// 2. ClusterIndex — Level hierarchy
// ============================================================================

/// Reference to a point or a cluster record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRef {
    Point(PointId),
    Cluster(ClusterId),
}

/// A node placed on one level, in normalised Mercator coordinates
#[derive(Debug, Clone, Copy)]
struct LevelNode {
    x: f64,
    y: f64,
    count: u32,
    node: NodeRef,
}

/// All nodes visible at one zoom plus their R-tree
#[derive(Debug)]
struct Level {
    nodes: Vec<LevelNode>,
    index: LevelIndex,
}

impl Level {
    fn new(nodes: Vec<LevelNode>) -> Self {
        let entries = nodes
            .iter()
            .enumerate()
            .map(|(slot, n)| IndexedNode { slot, x: n.x, y: n.y })
            .collect();
        Self {
            index: LevelIndex::bulk_load(entries),
            nodes,
        }
    }
}

/// An aggregate formed at `zoom` from nodes of level `zoom + 1`
#[derive(Debug)]
struct ClusterRecord {
    zoom: u8,
    x: f64,
    y: f64,
    count: u32,
    children: Vec<NodeRef>,
}

/// Precomputed cluster hierarchy over an immutable point set.
///
/// Rebuild from scratch when the point set changes.
#[derive(Debug)]
pub struct ClusterIndex {
    options: ClusterOptions,
    points: Vec<PointOfInterest>,
    clusters: Vec<ClusterRecord>,
    /// `levels[i]` holds zoom `min_zoom + i`; the last level is raw points
    levels: Vec<Level>,
}

// ============================================================================
// 3. Build (greedy agglomeration)
// ============================================================================

impl ClusterIndex {
    /// Validate `points` and precompute every zoom level.
    ///
    /// Fails with [`GeoError::InvalidInput`] if any point is out of range;
    /// nothing is built in that case.
    pub fn build(points: Vec<PointOfInterest>, options: &ClusterOptions) -> Result<Self> {
        validate_points(&points)?;
        let options = options.sanitized();
        let started = Instant::now();

        let raw: Vec<LevelNode> = points
            .iter()
            .enumerate()
            .map(|(i, p)| LevelNode {
                // +180 and -180 are one meridian; index both at x = 0
                x: lon_to_x(wrap_longitude(p.position.longitude)),
                y: lat_to_y(p.position.latitude),
                count: 1,
                node: NodeRef::Point(PointId(i as u32)),
            })
            .collect();

        let mut clusters = Vec::new();
        let mut levels = vec![Level::new(raw)];
        for zoom in (options.min_zoom..options.disable_clustering_above_zoom).rev() {
            let finer = &levels[levels.len() - 1];
            let nodes = agglomerate(finer, zoom, &options, &mut clusters);
            levels.push(Level::new(nodes));
        }
        levels.reverse();

        tracing::info!(
            "Built cluster index: {} points, {} clusters, zoom {}..={} in {:.1?}",
            points.len(),
            clusters.len(),
            options.min_zoom,
            options.disable_clustering_above_zoom,
            started.elapsed()
        );

        Ok(Self {
            options,
            points,
            clusters,
            levels,
        })
    }
}

/// Build level `zoom` from the next finer level.
fn agglomerate(
    finer: &Level,
    zoom: u8,
    options: &ClusterOptions,
    clusters: &mut Vec<ClusterRecord>,
) -> Vec<LevelNode> {
    // Footprints of radius r overlap when centres are closer than 2r
    let merge_distance = pixels_to_mercator(2.0 * options.radius_px, options.tile_size, zoom);
    let mut assigned = vec![false; finer.nodes.len()];
    let mut out = Vec::with_capacity(finer.nodes.len());

    for (slot, node) in finer.nodes.iter().enumerate() {
        if assigned[slot] {
            continue;
        }
        assigned[slot] = true;

        let neighbors: Vec<usize> = finer
            .index
            .within_radius(node.x, node.y, merge_distance)
            .into_iter()
            .filter(|&s| !assigned[s])
            .collect();

        if neighbors.is_empty() {
            out.push(*node);
            continue;
        }

        let mut wx = node.x * node.count as f64;
        let mut wy = node.y * node.count as f64;
        let mut count = node.count;
        let mut children = Vec::with_capacity(neighbors.len() + 1);
        children.push(node.node);

        for s in neighbors {
            assigned[s] = true;
            let member = &finer.nodes[s];
            wx += member.x * member.count as f64;
            wy += member.y * member.count as f64;
            count += member.count;
            children.push(member.node);
        }

        let id = ClusterId(clusters.len() as u32);
        let (x, y) = (wx / count as f64, wy / count as f64);
        clusters.push(ClusterRecord { zoom, x, y, count, children });
        out.push(LevelNode { x, y, count, node: NodeRef::Cluster(id) });
    }

    out
}

// ============================================================================
// 4. Queries (viewport, expansion zoom, children, leaves)
// ============================================================================

impl ClusterIndex {
    /// Nodes whose marker position falls inside `bounds` at `zoom`.
    ///
    /// Zoom is clamped to the precomputed range; at or above
    /// `disable_clustering_above_zoom` every node is a leaf. Results are
    /// ordered by their position in the level and are identical across calls.
    pub fn query(&self, bounds: &BoundingBox, zoom: u8) -> Vec<ClusterNode> {
        if self.points.is_empty() || !bounds.is_finite() {
            return Vec::new();
        }
        let level = self.level_for(zoom);

        let mut slots = Vec::new();
        for (west, south, east, north) in bounds.normalized_ranges() {
            slots.extend(level.index.query_rect(
                lon_to_x(west),
                lat_to_y(north),
                lon_to_x(east),
                lat_to_y(south),
            ));
        }
        slots.sort_unstable();
        slots.dedup();

        tracing::debug!(
            "Cluster query at zoom {}: {} of {} nodes in view",
            zoom,
            slots.len(),
            level.index.len()
        );

        slots.into_iter().map(|slot| self.materialize(level.nodes[slot].node)).collect()
    }

    /// [`query`](Self::query) for a map viewport
    pub fn query_viewport(&self, viewport: &Viewport) -> Vec<ClusterNode> {
        self.query(&viewport.bounds, viewport.zoom)
    }

    /// Minimum zoom at which this cluster's children are separate nodes.
    pub fn expansion_zoom(&self, id: ClusterId) -> Result<u8> {
        Ok(self.record(id)?.zoom + 1)
    }

    /// The nodes this cluster was formed from, one zoom level finer.
    pub fn children(&self, id: ClusterId) -> Result<Vec<ClusterNode>> {
        let record = self.record(id)?;
        Ok(record.children.iter().map(|&node| self.materialize(node)).collect())
    }

    /// Member points in id order, paginated.
    pub fn leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Result<Vec<PointOfInterest>> {
        self.record(id)?;
        Ok(self
            .member_ids(id)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|pid| self.points[pid.0 as usize].clone())
            .collect())
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The indexed point set, in id order
    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }

    /// Effective (sanitized) options
    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    fn level_for(&self, zoom: u8) -> &Level {
        let z = zoom.clamp(self.options.min_zoom, self.options.disable_clustering_above_zoom);
        &self.levels[(z - self.options.min_zoom) as usize]
    }

    fn record(&self, id: ClusterId) -> Result<&ClusterRecord> {
        self.clusters.get(id.0 as usize).ok_or(GeoError::UnknownCluster(id))
    }

    fn member_ids(&self, id: ClusterId) -> BTreeSet<PointId> {
        let mut members = BTreeSet::new();
        let mut stack = vec![NodeRef::Cluster(id)];
        while let Some(node) = stack.pop() {
            match node {
                NodeRef::Point(pid) => {
                    members.insert(pid);
                }
                NodeRef::Cluster(cid) => {
                    if let Some(record) = self.clusters.get(cid.0 as usize) {
                        stack.extend(record.children.iter().copied());
                    }
                }
            }
        }
        members
    }

    fn materialize(&self, node: NodeRef) -> ClusterNode {
        match node {
            NodeRef::Point(id) => ClusterNode::Leaf {
                id,
                point: self.points[id.0 as usize].clone(),
            },
            NodeRef::Cluster(id) => {
                let record = &self.clusters[id.0 as usize];
                ClusterNode::Cluster(ClusterSummary {
                    id,
                    centroid: GeoPoint::new(y_to_lat(record.y), x_to_lon(record.x)),
                    count: record.count as usize,
                    member_ids: self.member_ids(id),
                    expansion_zoom: record.zoom + 1,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn uniform_points(n: usize, seed: u64) -> Vec<PointOfInterest> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| PointOfInterest::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
            .collect()
    }

    fn world(index: &ClusterIndex, zoom: u8) -> Vec<ClusterNode> {
        index.query(&BoundingBox::world(), zoom)
    }

    #[test]
    fn test_empty_point_set() {
        let index = ClusterIndex::build(Vec::new(), &ClusterOptions::default()).unwrap();
        assert!(index.is_empty());
        for zoom in 0..=20 {
            assert!(world(&index, zoom).is_empty());
        }
    }

    #[test]
    fn test_invalid_point_rejects_build() {
        let points = vec![PointOfInterest::new(0.0, 0.0), PointOfInterest::new(0.0, 200.0)];
        let err = ClusterIndex::build(points, &ClusterOptions::default()).unwrap_err();
        assert!(matches!(err, GeoError::InvalidInput { index: 1, .. }));
    }

    #[test]
    fn test_single_point_is_always_a_leaf() {
        let index = ClusterIndex::build(vec![PointOfInterest::new(45.0, 7.0)], &ClusterOptions::default()).unwrap();
        for zoom in 0..=20 {
            let nodes = world(&index, zoom);
            assert_eq!(nodes.len(), 1);
            assert!(nodes[0].is_leaf(), "zoom {zoom}");
        }
    }

    #[test]
    fn test_clustering_disabled_from_min_zoom() {
        let points = vec![PointOfInterest::new(10.0, 10.0), PointOfInterest::new(10.0, 10.0)];

        let off = ClusterOptions::default().with_disable_clustering_above_zoom(0);
        let index = ClusterIndex::build(points.clone(), &off).unwrap();
        for zoom in [0, 1, 12, 25] {
            let nodes = world(&index, zoom);
            assert_eq!(nodes.len(), 2, "zoom {zoom}");
            assert!(nodes.iter().all(ClusterNode::is_leaf));
        }
        assert!(index.expansion_zoom(ClusterId(0)).is_err());

        let from_five = ClusterOptions {
            min_zoom: 5,
            disable_clustering_above_zoom: 5,
            ..ClusterOptions::default()
        };
        let index = ClusterIndex::build(points, &from_five).unwrap();
        assert!(world(&index, 0).iter().all(ClusterNode::is_leaf));
        assert!(world(&index, 9).iter().all(ClusterNode::is_leaf));
    }

    #[test]
    fn test_duplicates_merge_at_every_clustered_zoom() {
        let mut points: Vec<PointOfInterest> = (0..5).map(|_| PointOfInterest::new(48.85, 2.35)).collect();
        points.push(PointOfInterest::new(-33.86, 151.2));
        let options = ClusterOptions::default();
        let index = ClusterIndex::build(points, &options).unwrap();

        for zoom in options.min_zoom..options.disable_clustering_above_zoom {
            let nodes = world(&index, zoom);
            let holders: Vec<&ClusterSummary> = nodes
                .iter()
                .filter_map(|n| match n {
                    ClusterNode::Cluster(s) if (0..5).any(|i| s.member_ids.contains(&PointId(i))) => Some(s),
                    _ => None,
                })
                .collect();
            assert_eq!(holders.len(), 1, "duplicates split at zoom {zoom}");
            assert!((0..5).all(|i| holders[0].member_ids.contains(&PointId(i))));
        }

        // Far enough apart to stay separate once the world is wider than one tile
        let nodes = world(&index, 18);
        let ClusterNode::Cluster(dup) = &nodes[0] else {
            panic!("expected duplicate cluster first");
        };
        assert_eq!(dup.count, 5);
        assert_eq!(dup.member_ids, (0..5).map(PointId).collect());
        assert!((dup.centroid.latitude - 48.85).abs() < 1e-9);
        assert!((dup.centroid.longitude - 2.35).abs() < 1e-9);

        let raw = world(&index, options.disable_clustering_above_zoom);
        assert_eq!(raw.len(), 6);
        assert!(raw.iter().all(ClusterNode::is_leaf));
    }

    #[test]
    fn test_counts_conserved_and_bounded() {
        let points = uniform_points(300, 3);
        let index = ClusterIndex::build(points, &ClusterOptions::default()).unwrap();
        for zoom in 0..=22 {
            let nodes = world(&index, zoom);
            assert!(nodes.len() <= 300);
            assert_eq!(nodes.iter().map(ClusterNode::count).sum::<usize>(), 300, "zoom {zoom}");
            assert!(nodes.iter().all(|n| n.is_leaf() || n.count() >= 2));
        }
        let raw = world(&index, 19);
        assert_eq!(raw.len(), 300);
        assert!(raw.iter().all(ClusterNode::is_leaf));
        assert_eq!(world(&index, 25), raw);
    }

    #[test]
    fn test_query_is_deterministic() {
        let points = uniform_points(500, 42);
        let options = ClusterOptions::default();
        let a = ClusterIndex::build(points.clone(), &options).unwrap();
        let b = ClusterIndex::build(points, &options).unwrap();
        let bbox = BoundingBox::new(0.2, 0.2, 0.8, 0.8);
        for zoom in [4, 9, 12, 15] {
            assert_eq!(a.query(&bbox, zoom), a.query(&bbox, zoom));
            assert_eq!(a.query(&bbox, zoom), b.query(&bbox, zoom));
        }
    }

    #[test]
    fn test_thousand_points_aggregate_at_zoom_ten() {
        let points = uniform_points(1000, 2024);
        let options = ClusterOptions::default().with_radius(80.0);
        let index = ClusterIndex::build(points, &options).unwrap();
        let nodes = index.query(&BoundingBox::new(-0.5, -0.5, 1.5, 1.5), 10);
        assert!(nodes.len() < 50, "got {} nodes", nodes.len());
        assert!(nodes.len() > 1);
        assert_eq!(nodes.iter().map(ClusterNode::count).sum::<usize>(), 1000);
    }

    #[test]
    fn test_expansion_zoom_separates_pair() {
        // 0.01° apart on the equator: footprints overlap up to zoom 14
        let points = vec![PointOfInterest::new(0.0, 0.0), PointOfInterest::new(0.0, 0.01)];
        let index = ClusterIndex::build(points, &ClusterOptions::default()).unwrap();

        let coarse = world(&index, 5);
        assert_eq!(coarse.len(), 1);
        let ClusterNode::Cluster(summary) = &coarse[0] else {
            panic!("expected cluster at zoom 5");
        };
        assert_eq!(summary.count, 2);
        assert!((summary.centroid.longitude - 0.005).abs() < 1e-9);
        assert!(summary.centroid.latitude.abs() < 1e-9);

        let expansion = index.expansion_zoom(summary.id).unwrap();
        assert_eq!(expansion, 15);
        assert_eq!(summary.expansion_zoom, expansion);
        assert_eq!(world(&index, expansion - 1).len(), 1);

        let split = world(&index, expansion);
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(ClusterNode::is_leaf));
    }

    #[test]
    fn test_children_and_leaves() {
        let points: Vec<PointOfInterest> = (0..10)
            .map(|i| PointOfInterest::new(10.0, 10.0).with_osm_id(i))
            .collect();
        let index = ClusterIndex::build(points, &ClusterOptions::default()).unwrap();
        let nodes = world(&index, 18);
        let ClusterNode::Cluster(summary) = &nodes[0] else {
            panic!("expected cluster");
        };

        let children = index.children(summary.id).unwrap();
        assert_eq!(children.len(), 10);
        assert!(children.iter().all(ClusterNode::is_leaf));

        let page = index.leaves(summary.id, 3, 8).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].osm_id, Some(8));
        assert_eq!(page[1].osm_id, Some(9));
    }

    #[test]
    fn test_unknown_cluster() {
        let index = ClusterIndex::build(uniform_points(5, 1), &ClusterOptions::default()).unwrap();
        let missing = ClusterId(9999);
        assert!(matches!(index.expansion_zoom(missing), Err(GeoError::UnknownCluster(id)) if id == missing));
        assert!(index.children(missing).is_err());
        assert!(index.leaves(missing, 10, 0).is_err());
    }

    #[test]
    fn test_antimeridian_query() {
        let points = vec![
            PointOfInterest::new(0.0, 179.9),
            PointOfInterest::new(0.0, -179.9),
            PointOfInterest::new(0.0, 0.0),
        ];
        let index = ClusterIndex::build(points, &ClusterOptions::default()).unwrap();
        let nodes = index.query(&BoundingBox::new(170.0, -10.0, -170.0, 10.0), 19);
        let ids: Vec<PointId> = nodes
            .iter()
            .filter_map(|n| match n {
                ClusterNode::Leaf { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![PointId(0), PointId(1)]);
    }

    #[test]
    fn test_dateline_edges_include_points_on_it() {
        let points = vec![
            PointOfInterest::new(0.0, 180.0),
            PointOfInterest::new(0.0, -175.0),
            PointOfInterest::new(0.0, 175.0),
        ];
        let index = ClusterIndex::build(points, &ClusterOptions::default()).unwrap();

        let east_of_dateline = index.query(&BoundingBox::new(180.0, -10.0, -170.0, 10.0), 19);
        let ids: Vec<PointId> = east_of_dateline
            .iter()
            .filter_map(|n| match n {
                ClusterNode::Leaf { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![PointId(0), PointId(1)]);

        let west_of_dateline = index.query(&BoundingBox::new(170.0, -10.0, 180.0, 10.0), 19);
        assert_eq!(west_of_dateline.len(), 2);
        assert!(west_of_dateline.iter().all(|n| n.position().longitude != -175.0));

        // Leaves keep the longitude they were loaded with
        assert_eq!(east_of_dateline[0].position().longitude, 180.0);
    }

    #[test]
    fn test_dateline_duplicates_merge() {
        let points = vec![
            PointOfInterest::new(-16.5, 180.0),
            PointOfInterest::new(-16.5, -180.0),
            PointOfInterest::new(-16.5, 180.0),
        ];
        let index = ClusterIndex::build(points, &ClusterOptions::default()).unwrap();
        for zoom in 0..19 {
            let nodes = world(&index, zoom);
            assert_eq!(nodes.len(), 1, "zoom {zoom}");
            assert_eq!(nodes[0].count(), 3);
        }
        assert_eq!(world(&index, 19).len(), 3);
    }

    #[test]
    fn test_non_finite_bounds_yield_nothing() {
        let index = ClusterIndex::build(uniform_points(10, 5), &ClusterOptions::default()).unwrap();
        assert!(index.query(&BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0), 10).is_empty());
    }

    #[test]
    fn test_query_viewport_matches_query() {
        let index = ClusterIndex::build(uniform_points(50, 8), &ClusterOptions::default()).unwrap();
        let viewport = Viewport::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 8);
        assert_eq!(index.query_viewport(&viewport), index.query(&viewport.bounds, 8));
    }
}
