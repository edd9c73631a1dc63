//! Ordered storage for geometry items.

use crate::types::{Geometry, ItemId};
use serde::{Deserialize, Serialize};

/// Spatial metadata shared by every item in a container.
///
/// Captured at import time and used to default export parameters; survives
/// [`Container::clear_items`] so re-imports into a live session keep their
/// frame of reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Extent of the normalized coordinate volume
    pub shape: Option<[f32; 3]>,
    /// Sampling rate the items were normalized to
    pub sampling_rate: f32,
}

impl Default for ContainerMetadata {
    fn default() -> Self {
        Self {
            shape: None,
            sampling_rate: 1.0,
        }
    }
}

/// Ordered collection of [`Geometry`] items with stable insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    /// Items in insertion order
    items: Vec<Geometry>,
    /// Shared spatial metadata
    pub metadata: ContainerMetadata,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item, returning its id.
    pub fn add(&mut self, geometry: Geometry) -> ItemId {
        let id = geometry.id;
        self.items.push(geometry);
        id
    }

    /// Remove an item by id. Absent ids are tolerated and return `false`,
    /// since selection steps may target items that were never committed.
    pub fn remove(&mut self, id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Look up an item by id.
    pub fn get(&self, id: ItemId) -> Option<&Geometry> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Geometry> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Move all items out, leaving the container empty but keeping metadata.
    pub fn drain(&mut self) -> Vec<Geometry> {
        std::mem::take(&mut self.items)
    }

    /// Remove all items. Metadata survives.
    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    /// Iterate items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Geometry> {
        self.items.iter()
    }

    /// Ids of all items in insertion order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the container holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True if an item with `id` is present.
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}
