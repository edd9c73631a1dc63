//! Core data types for tessera
//!
//! This module contains the fundamental data structures shared across the
//! pipeline, session, and format layers.
//!
//! # Main Types
//!
//! - [`Geometry`] - A single point-cloud or mesh item with stable identity
//! - [`Representation`] - How an item is rendered/exported (points vs surface)
//! - [`ItemId`] / [`GroupId`] - Process-unique identifiers for items and
//!   provenance groups
//!
//! # Identity
//!
//! Ids are minted from process-wide atomic counters so that items created on
//! any worker thread never collide. Loading a persisted session calls
//! [`ItemId::observe`] / [`GroupId::observe`] to advance the counters past
//! every id seen in the archive.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique geometry item IDs
static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Global counter for generating unique provenance group IDs
static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Advance `counter` so the next mint is strictly greater than `seen`.
fn observe_id(counter: &AtomicU64, seen: u64) {
    let mut current = counter.load(Ordering::SeqCst);
    while current <= seen {
        match counter.compare_exchange(current, seen + 1, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => break,
            Err(new_current) => current = new_current,
        }
    }
}

/// Stable identifier of a [`Geometry`] item.
///
/// Survives container membership changes and session round-trips; the
/// provenance trees reference items by this id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Mint a fresh process-unique id.
    pub fn next() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Record an id loaded from persistence so future mints never collide.
    pub fn observe(self) {
        observe_id(&NEXT_ITEM_ID, self.0);
    }
}

impl std::fmt::Debug for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a named group in a provenance tree.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl GroupId {
    /// Mint a fresh process-unique id.
    pub fn next() -> Self {
        GroupId(NEXT_GROUP_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Record an id loaded from persistence so future mints never collide.
    pub fn observe(self) {
        observe_id(&NEXT_GROUP_ID, self.0);
    }
}

impl std::fmt::Debug for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a geometry item is represented for display and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// Raw point set (default for imported and clustered data)
    #[default]
    #[serde(alias = "pointcloud")]
    PointCloud,
    /// Triangulated surface (model-producing operations switch to this)
    #[serde(alias = "mesh")]
    Surface,
}

impl std::fmt::Display for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Representation::PointCloud => write!(f, "point_cloud"),
            Representation::Surface => write!(f, "surface"),
        }
    }
}

/// A single geometry item: a point cloud or mesh with stable identity.
///
/// Items flow through pipeline operations as the current batch and are
/// committed into session containers when an operation saves its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    /// Stable identifier, referenced by provenance trees
    pub id: ItemId,
    /// Vertex positions
    #[serde(alias = "vertices")]
    pub points: Vec<[f32; 3]>,
    /// Optional per-vertex normals (same length as `points` when present)
    #[serde(default)]
    pub normals: Option<Vec<[f32; 3]>>,
    /// Optional triangle faces indexing into `points`
    #[serde(default)]
    pub faces: Option<Vec<[u32; 3]>>,
    /// Spacing of the coordinate grid the points live on
    #[serde(alias = "sampling")]
    pub sampling_rate: f32,
    /// Whether the item is shown in interactive views and written by exports
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Current display/export representation
    #[serde(default)]
    pub representation: Representation,
}

fn default_visible() -> bool {
    true
}

impl Geometry {
    /// Create a new point-cloud item with a fresh id.
    pub fn new(points: Vec<[f32; 3]>) -> Self {
        Self {
            id: ItemId::next(),
            points,
            normals: None,
            faces: None,
            sampling_rate: 1.0,
            visible: true,
            representation: Representation::PointCloud,
        }
    }

    /// Set per-vertex normals.
    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Set triangle faces.
    pub fn with_faces(mut self, faces: Vec<[u32; 3]>) -> Self {
        self.faces = Some(faces);
        self
    }

    /// Set the sampling rate.
    pub fn with_sampling_rate(mut self, sampling_rate: f32) -> Self {
        self.sampling_rate = sampling_rate;
        self
    }

    /// Number of vertices in this item.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Show or hide this item.
    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Switch the display/export representation.
    pub fn change_representation(&mut self, representation: Representation) {
        self.representation = representation;
    }

    /// Component-wise maximum coordinate, or `None` for an empty item.
    pub fn max_extent(&self) -> Option<[f32; 3]> {
        let mut points = self.points.iter();
        let first = *points.next()?;
        Some(points.fold(first, |acc, p| {
            [acc[0].max(p[0]), acc[1].max(p[1]), acc[2].max(p[2])]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ids_are_unique() {
        let a = ItemId::next();
        let b = ItemId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_observe_advances_counter() {
        let current = ItemId::next();
        ItemId(current.0 + 1000).observe();
        let next = ItemId::next();
        assert!(next.0 > current.0 + 1000);
    }

    #[test]
    fn test_observe_never_rewinds() {
        let current = ItemId::next();
        ItemId(0).observe();
        let next = ItemId::next();
        assert!(next.0 > current.0);
    }

    #[test]
    fn test_max_extent() {
        let geometry = Geometry::new(vec![[1.0, 5.0, 2.0], [3.0, 0.0, 4.0]]);
        assert_eq!(geometry.max_extent(), Some([3.0, 5.0, 4.0]));

        let empty = Geometry::new(Vec::new());
        assert_eq!(empty.max_extent(), None);
        assert_eq!(empty.point_count(), 0);
    }

    #[test]
    fn test_representation_legacy_aliases() {
        let from_legacy: Representation = serde_json::from_str("\"pointcloud\"").unwrap();
        assert_eq!(from_legacy, Representation::PointCloud);
        let from_mesh: Representation = serde_json::from_str("\"mesh\"").unwrap();
        assert_eq!(from_mesh, Representation::Surface);
        let current: Representation = serde_json::from_str("\"surface\"").unwrap();
        assert_eq!(current, Representation::Surface);
    }

    #[test]
    fn test_geometry_builder_defaults() {
        let geometry = Geometry::new(vec![[0.0, 0.0, 0.0]]).with_sampling_rate(2.0);
        assert!(geometry.visible);
        assert_eq!(geometry.representation, Representation::PointCloud);
        assert_eq!(geometry.sampling_rate, 2.0);
        assert!(geometry.normals.is_none());
    }
}
