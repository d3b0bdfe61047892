//! View state and text rendering
//!
//! Selection state is an explicit object owned by the presentation layer
//! and passed into query functions; the forest itself stays immutable.

use crate::forest::{EdgeKind, LineageForest, LineageNode};
use pevo_types::{MutationAttempt, PersonaVersion, VersionId};
use serde::{Deserialize, Serialize};

/// Externally owned selection state for lineage displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    /// Currently selected version, if any
    pub selected_version_id: Option<VersionId>,
    /// Currently selected attempt within that version, if any
    pub selected_mutation_index: Option<u32>,
}

impl ViewState {
    /// Create an empty selection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a version, clearing any attempt selection
    pub fn select_version(&mut self, id: VersionId) {
        self.selected_version_id = Some(id);
        self.selected_mutation_index = None;
    }

    /// Select an attempt within the selected version
    pub fn select_mutation(&mut self, index: u32) {
        self.selected_mutation_index = Some(index);
    }

    /// Clear the whole selection
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Resolve the selected version against a forest
    #[must_use]
    pub fn selected_version<'a>(&self, forest: &'a LineageForest) -> Option<&'a PersonaVersion> {
        self.selected_version_id
            .and_then(|id| forest.get(id))
            .map(|node| &node.version)
    }

    /// Resolve the selected mutation attempt against a forest
    #[must_use]
    pub fn selected_attempt<'a>(&self, forest: &'a LineageForest) -> Option<&'a MutationAttempt> {
        let version = self.selected_version(forest)?;
        let index = self.selected_mutation_index?;
        version
            .mutation_attempts
            .iter()
            .find(|a| a.mutation_index == index)
    }
}

/// Render the forest as an indented text tree
///
/// Improved edges draw solid (`──`), flat/regressed edges dashed (`╌╌`);
/// the active version and winning attempts are marked inline.
#[must_use]
pub fn render_text(forest: &LineageForest) -> String {
    let mut out = String::new();
    for &root in forest.roots() {
        render_node(forest, root, &mut out);
    }
    out
}

fn render_node(forest: &LineageForest, idx: usize, out: &mut String) {
    let node = forest.node(idx);
    let indent = "    ".repeat(node.depth as usize);

    let connector = match node.edge_kind() {
        None => String::new(),
        Some(EdgeKind::Improved) => "└── ".to_string(),
        Some(EdgeKind::Regressed) => "└╌╌ ".to_string(),
    };

    out.push_str(&format!(
        "{indent}{connector}v{} {:.1}/10{}{}{}\n",
        node.version.version,
        node.version.fitness_score,
        node.delta
            .map(|d| format!(" ({d:+.1})"))
            .unwrap_or_default(),
        attempts_summary(node),
        if node.is_active { "  [active]" } else { "" },
    ));

    for &child in &node.children {
        render_node(forest, child, out);
    }
}

fn attempts_summary(node: &LineageNode) -> String {
    if node.version.mutation_attempts.is_empty() {
        return String::new();
    }
    let winner = node
        .version
        .winner()
        .map(|w| format!(", winner #{}", w.mutation_index))
        .unwrap_or_default();
    format!(
        "  [{} attempts{winner}]",
        node.version.mutation_attempts.len()
    )
}
