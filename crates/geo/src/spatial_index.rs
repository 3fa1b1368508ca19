//! # Spatial Index
//!
//! R-tree wrapper over one zoom level's nodes, in normalised Web Mercator
//! space. Each entry carries the slot of its node in the level's node list so
//! lookups can be mapped back without cloning node payloads.
//!
//! ## Table of Contents
//! 1. LevelIndex — R-tree over one level, radius and rectangle queries
//! 2. IndexedNode — R-tree entry

use rstar::{PointDistance, RTree, RTreeObject, AABB};

// ============================================================================
// 1. LevelIndex — R-tree over one level
// ============================================================================

/// R-tree of node positions for a single zoom level.
#[derive(Debug, Default)]
pub(crate) struct LevelIndex {
    tree: RTree<IndexedNode>,
}

impl LevelIndex {
    /// Bulk-load entries (much faster than individual inserts)
    pub fn bulk_load(entries: Vec<IndexedNode>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Slots of all nodes within `radius` of `(x, y)`, ascending.
    pub fn within_radius(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .tree
            .locate_within_distance([x, y], radius * radius)
            .map(|n| n.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Slots of all nodes inside the rectangle, ascending.
    pub fn query_rect(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        let mut slots: Vec<usize> = self.tree.locate_in_envelope(&envelope).map(|n| n.slot).collect();
        slots.sort_unstable();
        slots
    }

    /// Number of indexed nodes
    pub fn len(&self) -> usize {
        self.tree.size()
    }
}

// ============================================================================
// 2. IndexedNode — R-tree entry
// ============================================================================

/// A node position in the spatial index
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexedNode {
    /// Position in the owning level's node list
    pub slot: usize,
    /// Normalised Mercator x
    pub x: f64,
    /// Normalised Mercator y
    pub y: f64,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}
