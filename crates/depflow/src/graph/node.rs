//! Arena-based node and graph types for the dependency graph.

use crate::models::{Build, DependencyDetail, GitDiff};
use std::collections::HashSet;
use std::fmt;

/// Stable handle of a node within one [`DependencyGraph`].
///
/// Ids are indices into the graph's arena; they are only meaningful for the
/// graph that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The arena index behind this id.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One (repository, commit) pair discovered during a graph build.
///
/// Exactly one node exists per distinct pair within a graph; reaching the
/// same pair along another path adds an edge to the existing node.
#[derive(Debug, Clone)]
pub struct DependencyGraphNode {
    /// Repository URI.
    pub repository: String,

    /// Commit within the repository.
    pub commit: String,

    /// Dependencies declared at this node. `None` until fetched, and kept
    /// `None` when the commit carries no dependency manifest.
    pub dependencies: Option<Vec<DependencyDetail>>,

    /// Builds whose output matches this node, when build lookup was enabled.
    pub contributing_builds: Vec<Build>,

    /// Diff against the reference commit selected by the diff mode.
    pub diff_from: Option<GitDiff>,

    /// Normalized repository URIs on the path from the root to this node,
    /// including this node's own. Cycle detection only; not part of the
    /// graph's public shape.
    pub(crate) visited_repos: HashSet<String>,

    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<(NodeId, DependencyDetail)>,
}

impl DependencyGraphNode {
    pub(crate) fn new(
        repository: &str,
        commit: &str,
        dependencies: Option<Vec<DependencyDetail>>,
        visited_repos: HashSet<String>,
    ) -> Self {
        DependencyGraphNode {
            repository: repository.to_string(),
            commit: commit.to_string(),
            dependencies,
            contributing_builds: Vec::new(),
            diff_from: None,
            visited_repos,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Nodes that depend on this one.
    #[must_use]
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Nodes this one depends on, each with the dependency entry that
    /// produced the edge.
    #[must_use]
    pub fn children(&self) -> &[(NodeId, DependencyDetail)] {
        &self.children
    }
}

/// The result of one dependency-graph build.
#[derive(Debug)]
pub struct DependencyGraph {
    pub(crate) nodes: Vec<DependencyGraphNode>,
    pub(crate) root: NodeId,
    pub(crate) unique_dependencies: Vec<DependencyDetail>,
    pub(crate) incoherent_nodes: Vec<NodeId>,
    pub(crate) incoherent_dependencies: Vec<DependencyDetail>,
    pub(crate) contributing_builds: Vec<Build>,
    pub(crate) cycles: Vec<Vec<NodeId>>,
}

impl DependencyGraph {
    /// The root node the build started from.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DependencyGraphNode {
        &self.nodes[id.0]
    }

    /// All nodes with their ids, in discovery order (root first).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyGraphNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of distinct (repository, commit) pairs discovered.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Strictly deduplicated set of every dependency seen in the graph.
    #[must_use]
    pub fn unique_dependencies(&self) -> &[DependencyDetail] {
        &self.unique_dependencies
    }

    /// Nodes sharing a repository URI with another node at a different commit.
    #[must_use]
    pub fn incoherent_nodes(&self) -> &[NodeId] {
        &self.incoherent_nodes
    }

    /// Dependencies whose name appears in the graph with more than one loose
    /// identity (differing version or commit).
    #[must_use]
    pub fn incoherent_dependencies(&self) -> &[DependencyDetail] {
        &self.incoherent_dependencies
    }

    /// Builds contributing to any node, when build lookup was enabled.
    #[must_use]
    pub fn contributing_builds(&self) -> &[Build] {
        &self.contributing_builds
    }

    /// Cycle paths recorded during the build, topmost node first. Empty
    /// unless cycle-path computation was requested.
    #[must_use]
    pub fn cycles(&self) -> &[Vec<NodeId>] {
        &self.cycles
    }
}
