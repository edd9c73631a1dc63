//! Session state for pipeline runs
//!
//! A [`Session`] is the working set one run executes against: a cluster
//! container for point-cloud data, a model container for fitted/meshed data,
//! and a provenance tree per container recording where items came from.
//! Sessions are owned exclusively by the thread executing the run and are
//! never shared.
//!
//! # Persistence
//!
//! [`store`] serializes sessions to self-describing binary archives and
//! loads archives written by the predecessor application through a
//! field-name compatibility shim.

pub mod container;
pub mod store;
pub mod tree;

pub use container::{Container, ContainerMetadata};
pub use store::{load_session, save_session, session_path, SESSION_EXTENSION};
pub use tree::{ProvenanceTree, TreeEntry};

use crate::ops::OutputClass;
use crate::types::{Geometry, GroupId, ItemId};

/// Working set for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Extent of the normalized coordinate volume established at import
    pub shape: Option<[f32; 3]>,
    /// Point-cloud working data
    pub clusters: Container,
    /// Fitted/meshed model data
    pub models: Container,
    /// Provenance of the cluster container
    pub clusters_tree: ProvenanceTree,
    /// Provenance of the model container
    pub models_tree: ProvenanceTree,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container for an output class.
    pub fn container(&self, class: OutputClass) -> &Container {
        match class {
            OutputClass::Clusters => &self.clusters,
            OutputClass::Models => &self.models,
        }
    }

    /// Mutable container and its paired tree for an output class.
    pub fn working_set_mut(
        &mut self,
        class: OutputClass,
    ) -> (&mut Container, &mut ProvenanceTree) {
        match class {
            OutputClass::Clusters => (&mut self.clusters, &mut self.clusters_tree),
            OutputClass::Models => (&mut self.models, &mut self.models_tree),
        }
    }

    /// Commit operation outputs: add every item to the class's container
    /// and record them as a named provenance group.
    pub fn commit_group(
        &mut self,
        class: OutputClass,
        items: Vec<Geometry>,
        group_name: &str,
    ) -> GroupId {
        let (container, tree) = self.working_set_mut(class);
        let ids: Vec<ItemId> = items.into_iter().map(|item| container.add(item)).collect();
        tree.add_group(group_name, ids)
    }

    /// Remove an item from a container and its tree in one step.
    pub fn remove_item(&mut self, class: OutputClass, id: ItemId) {
        let (container, tree) = self.working_set_mut(class);
        container.remove(id);
        tree.remove_item(id);
    }

    /// Drop all items, groups, and the shape. Run termination calls this so
    /// no working data outlives the run.
    pub fn clear(&mut self) {
        self.clusters.clear_items();
        self.models.clear_items();
        self.clusters_tree.clear();
        self.models_tree.clear();
        self.shape = None;
    }

    /// True when both containers are empty.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Geometry {
        Geometry::new(vec![[0.0; 3], [1.0; 3]])
    }

    #[test]
    fn test_commit_group_pairs_container_and_tree() {
        let mut session = Session::new();
        let group = session.commit_group(
            OutputClass::Clusters,
            vec![item(), item()],
            "cluster_out",
        );

        assert_eq!(session.clusters.len(), 2);
        assert_eq!(session.clusters_tree.group_members(group).map(<[_]>::len), Some(2));
        assert!(session.clusters_tree.is_consistent_with(&session.clusters));
        assert!(session.models.is_empty());
    }

    #[test]
    fn test_remove_item_keeps_invariant() {
        let mut session = Session::new();
        let group = session.commit_group(OutputClass::Clusters, vec![item(), item()], "g");
        let victim = session.clusters_tree.group_members(group).unwrap()[0];

        session.remove_item(OutputClass::Clusters, victim);

        assert_eq!(session.clusters.len(), 1);
        assert!(!session.clusters_tree.contains_item(victim));
        assert!(session.clusters_tree.is_consistent_with(&session.clusters));
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut session = Session::new();
        session.shape = Some([32.0; 3]);
        session.commit_group(OutputClass::Clusters, vec![item()], "g");
        session.commit_group(OutputClass::Models, vec![item()], "m");

        session.clear();

        assert!(session.is_empty());
        assert!(session.clusters_tree.is_empty());
        assert!(session.models_tree.is_empty());
        assert_eq!(session.shape, None);
    }
}
