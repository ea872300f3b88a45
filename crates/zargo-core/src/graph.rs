//! Edge types of the resolved dependency graph.
//!
//! The graph is flat: an append-only edge list in breadth-first discovery
//! order, with nodes addressed by their position in the engine's dependency
//! table (`dep_idx`). The emitters rely on that order; edges are never
//! reordered after the fact.

use std::fmt;

/// The parent side of a dependency edge: either the project itself (in its
/// normal-deps or build-deps flavor) or a previously discovered dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    RootNormal,
    RootBuild,
    Dep(usize),
}

impl Parent {
    /// Whether this edge hangs directly off the project.
    pub fn is_root(self) -> bool {
        matches!(self, Parent::RootNormal | Parent::RootBuild)
    }
}

/// A parent→child relation in the dependency graph.
///
/// `to` is always a valid dependency-table index; `alias` is the name under
/// which the parent refers to the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: Parent,
    pub to: usize,
    pub alias: String,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Parent::RootNormal => write!(f, "root -> {} ({})", self.to, self.alias),
            Parent::RootBuild => write!(f, "root(build) -> {} ({})", self.to, self.alias),
            Parent::Dep(i) => write!(f, "{} -> {} ({})", i, self.to, self.alias),
        }
    }
}
