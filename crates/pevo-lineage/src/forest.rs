//! Arena-backed lineage forest
//!
//! Nodes live in a flat array and reference each other by index, with an
//! id-keyed lookup built once. Depth and edges are derived strictly from
//! `parent_version_id`, never from input position, so branching lineages
//! (one parent, several children) reconstruct correctly.

use pevo_types::{PersonaVersion, VersionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Classification of the edge from a version to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Score strictly improved over the parent (rendered solid)
    Improved,
    /// Score flat or regressed (rendered dashed)
    Regressed,
}

impl EdgeKind {
    /// Classify a score delta
    #[inline]
    #[must_use]
    pub fn classify(delta: f64) -> Self {
        if delta > 0.0 {
            Self::Improved
        } else {
            Self::Regressed
        }
    }

    /// Whether the edge renders as a solid line
    #[inline]
    #[must_use]
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Improved)
    }
}

/// One version in the reconstructed forest
#[derive(Debug, Clone)]
pub struct LineageNode {
    /// The ledger record
    pub version: PersonaVersion,
    /// Arena index of the parent, if resolved
    pub parent: Option<usize>,
    /// Arena indices of children, in version order
    pub children: Vec<usize>,
    /// 0 for roots, `parent.depth + 1` otherwise
    pub depth: u32,
    /// `fitness_score - parent.fitness_score`; `None` for roots
    pub delta: Option<f64>,
    /// Whether this version currently serves live traffic
    pub is_active: bool,
}

impl LineageNode {
    /// Edge classification toward the parent, if any
    #[inline]
    #[must_use]
    pub fn edge_kind(&self) -> Option<EdgeKind> {
        self.delta.map(EdgeKind::classify)
    }
}

/// Reconstructed version forest for one persona
#[derive(Debug, Clone, Default)]
pub struct LineageForest {
    nodes: Vec<LineageNode>,
    roots: Vec<usize>,
    index: HashMap<VersionId, usize>,
}

impl LineageForest {
    /// Build the forest from the store's newest-first version list
    ///
    /// The input is reversed to oldest-first, an id lookup is built once,
    /// then a single pass links children and assigns depths - linear in
    /// the number of versions. A version whose parent id is absent from
    /// the input becomes a root of its own tree rather than an error.
    #[must_use]
    pub fn build(versions: Vec<PersonaVersion>, active: Option<VersionId>) -> Self {
        let mut nodes: Vec<LineageNode> = Vec::with_capacity(versions.len());
        let mut index = HashMap::with_capacity(versions.len());

        // Oldest first, so parents precede their children (parent version
        // numbers are strictly smaller).
        for version in versions.into_iter().rev() {
            let is_active = active == Some(version.id);
            index.insert(version.id, nodes.len());
            nodes.push(LineageNode {
                version,
                parent: None,
                children: Vec::new(),
                depth: 0,
                delta: None,
                is_active,
            });
        }

        let mut roots = Vec::new();
        for idx in 0..nodes.len() {
            let parent_id = nodes[idx].version.parent_version_id;
            let Some(parent_id) = parent_id else {
                roots.push(idx);
                continue;
            };
            let Some(&parent_idx) = index.get(&parent_id) else {
                tracing::warn!(
                    version_id = %nodes[idx].version.id,
                    %parent_id,
                    "parent missing from input, treating version as a root"
                );
                roots.push(idx);
                continue;
            };

            let parent_depth = nodes[parent_idx].depth;
            let parent_score = nodes[parent_idx].version.fitness_score;
            let node = &mut nodes[idx];
            node.parent = Some(parent_idx);
            node.depth = parent_depth + 1;
            node.delta = Some(node.version.fitness_score - parent_score);
            nodes[parent_idx].children.push(idx);
        }

        Self {
            nodes,
            roots,
            index,
        }
    }

    /// Number of versions in the forest
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in arena (oldest-first) order
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[LineageNode] {
        &self.nodes
    }

    /// Arena indices of the roots
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node at an arena index
    #[inline]
    #[must_use]
    pub fn node(&self, idx: usize) -> &LineageNode {
        &self.nodes[idx]
    }

    /// Look up a node by version id
    #[must_use]
    pub fn get(&self, id: VersionId) -> Option<&LineageNode> {
        self.index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// The active node, if the active version is in this forest
    #[must_use]
    pub fn active(&self) -> Option<&LineageNode> {
        self.nodes.iter().find(|n| n.is_active)
    }
}


#[cfg(test)]
mod properties {
    use super::*;
    use pevo_types::PersonaId;
    use proptest::prelude::*;

    proptest! {
        /// Depth equals parent depth + 1 for every resolvable shape of
        /// chains-with-branches, and every non-root edge resolves.
        #[test]
        fn depth_is_parent_derived(parent_slots in prop::collection::vec(0usize..32, 0..32)) {
            let persona = PersonaId::new();
            let mut versions = vec![PersonaVersion::baseline(persona, "p", 5.0)];
            for (i, slot) in parent_slots.iter().enumerate() {
                let parent = &versions[slot % versions.len()];
                let parent_id = parent.id;
                versions.push(PersonaVersion::derived(
                    persona,
                    i as u32 + 2,
                    parent_id,
                    "p",
                    5.0,
                ));
            }
            let mut newest_first = versions;
            newest_first.reverse();
            let total = newest_first.len();

            let forest = LineageForest::build(newest_first, None);
            prop_assert_eq!(forest.len(), total);
            prop_assert_eq!(forest.roots().len(), 1);

            for node in forest.nodes() {
                match node.parent {
                    None => prop_assert_eq!(node.depth, 0),
                    Some(parent_idx) => {
                        let parent = forest.node(parent_idx);
                        prop_assert_eq!(node.depth, parent.depth + 1);
                        prop_assert!(parent.version.version < node.version.version);
                    }
                }
            }
        }
    }
}
