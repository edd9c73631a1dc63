//! Provenance tracking for container items.
//!
//! Each container is paired with a [`ProvenanceTree`] recording where its
//! items came from: imported items sit at the root, and every operation that
//! commits outputs adds a named group. The tree drives interactive display
//! order and lets selection steps remove an item everywhere at once.

use crate::session::container::Container;
use crate::types::{GroupId, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry at the top level of the tree, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEntry {
    /// A single ungrouped item (typically imported data)
    Item(ItemId),
    /// A named group of operation outputs
    Group(GroupId),
}

/// Derivation record for one container.
///
/// Invariant: while the owning session is live, every item id referenced
/// here exists in the paired container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceTree {
    /// Top-level entries in display order
    root_items: Vec<TreeEntry>,
    /// Members of each group, in commit order
    groups: BTreeMap<GroupId, Vec<ItemId>>,
    /// Display name of each group
    group_names: BTreeMap<GroupId, String>,
}

impl ProvenanceTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append ungrouped items at the root (import seeding).
    pub fn seed_roots(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.root_items.extend(ids.into_iter().map(TreeEntry::Item));
    }

    /// Record a new named group and append it to the display order.
    pub fn add_group(&mut self, name: impl Into<String>, members: Vec<ItemId>) -> GroupId {
        let id = GroupId::next();
        self.root_items.push(TreeEntry::Group(id));
        self.group_names.insert(id, name.into());
        self.groups.insert(id, members);
        id
    }

    /// Remove an item from the root and from every group it appears in.
    /// Groups left empty are pruned along with their display entry.
    /// Tolerant of ids the tree never saw.
    pub fn remove_item(&mut self, id: ItemId) {
        self.root_items.retain(|entry| *entry != TreeEntry::Item(id));

        let mut emptied = Vec::new();
        for (&group_id, members) in self.groups.iter_mut() {
            members.retain(|&member| member != id);
            if members.is_empty() {
                emptied.push(group_id);
            }
        }
        for group_id in emptied {
            self.groups.remove(&group_id);
            self.group_names.remove(&group_id);
            self.root_items
                .retain(|entry| *entry != TreeEntry::Group(group_id));
        }
    }

    /// Drop all entries, groups, and names.
    pub fn clear(&mut self) {
        self.root_items.clear();
        self.groups.clear();
        self.group_names.clear();
    }

    /// Top-level entries in display order.
    pub fn root_entries(&self) -> &[TreeEntry] {
        &self.root_items
    }

    /// Display name of a group.
    pub fn group_name(&self, id: GroupId) -> Option<&str> {
        self.group_names.get(&id).map(String::as_str)
    }

    /// Members of a group, in commit order.
    pub fn group_members(&self, id: GroupId) -> Option<&[ItemId]> {
        self.groups.get(&id).map(Vec::as_slice)
    }

    /// Every item id referenced anywhere in the tree, in display order.
    pub fn all_items(&self) -> Vec<ItemId> {
        let mut items = Vec::new();
        for entry in &self.root_items {
            match entry {
                TreeEntry::Item(id) => items.push(*id),
                TreeEntry::Group(group_id) => {
                    if let Some(members) = self.groups.get(group_id) {
                        items.extend_from_slice(members);
                    }
                }
            }
        }
        items
    }

    /// True when the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.root_items.is_empty()
    }

    /// True if `id` appears at the root or in any group.
    pub fn contains_item(&self, id: ItemId) -> bool {
        self.all_items().contains(&id)
    }

    /// Check the strict pairing invariant: every referenced item, root
    /// entries included, exists in `container`.
    pub fn is_consistent_with(&self, container: &Container) -> bool {
        self.all_items().iter().all(|&id| container.contains(id))
    }

    /// Check the group pairing invariant only. Root entries may point at
    /// items that were drained into a working batch, but group members
    /// must always be present in `container`.
    pub fn groups_consistent_with(&self, container: &Container) -> bool {
        self.groups
            .values()
            .flatten()
            .all(|&id| container.contains(id))
    }

    /// Advance the id counters past everything referenced here. Called
    /// after loading a persisted session.
    pub(crate) fn observe_ids(&self) {
        for entry in &self.root_items {
            if let TreeEntry::Group(id) = entry {
                id.observe();
            }
        }
        for (&group_id, members) in &self.groups {
            group_id.observe();
            for member in members {
                member.observe();
            }
        }
        for entry in &self.root_items {
            if let TreeEntry::Item(id) = entry {
                id.observe();
            }
        }
    }
}
