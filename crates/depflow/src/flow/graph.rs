//! Flow graph storage and consistency-preserving mutation.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;

use crate::models::{Subscription, normalize_key};

pub use petgraph::graph::{EdgeIndex, NodeIndex};

/// One (repository, branch) pair participating in dependency flow.
#[derive(Debug, Clone)]
pub struct DependencyFlowNode {
    /// Repository URI.
    pub repository: String,

    /// Branch within the repository.
    pub branch: String,

    /// Channels builds of this branch are published to.
    pub output_channels: BTreeSet<String>,

    /// Channels this branch consumes builds from, derived from the incoming
    /// subscription edges.
    pub input_channels: BTreeSet<String>,

    /// Average official build time in minutes over the lookback window.
    pub official_build_time: f64,

    /// Average dependency-update PR time in minutes over the lookback window.
    pub pr_build_time: f64,

    /// Goal build time in minutes, when one is configured.
    pub goal_time_in_minutes: f64,

    /// Best-case time in minutes for a change here to reach a flow root.
    pub best_case_path_time: f64,

    /// Worst-case time in minutes for a change here to reach a flow root.
    pub worst_case_path_time: f64,

    /// Set by the longest-build-path marking pass.
    pub on_longest_build_path: bool,

    /// Marks a repository that only ships tooling. Supplied by the caller;
    /// the path analyses skip tooling-only nodes.
    pub is_tooling_only: bool,
}

impl DependencyFlowNode {
    pub(crate) fn new(repository: &str, branch: &str) -> Self {
        DependencyFlowNode {
            repository: repository.to_string(),
            branch: branch.to_string(),
            output_channels: BTreeSet::new(),
            input_channels: BTreeSet::new(),
            official_build_time: 0.0,
            pr_build_time: 0.0,
            goal_time_in_minutes: 0.0,
            best_case_path_time: 0.0,
            worst_case_path_time: 0.0,
            on_longest_build_path: false,
            is_tooling_only: false,
        }
    }
}

/// One subscription carrying builds from a source node to a target node.
#[derive(Debug, Clone)]
pub struct DependencyFlowEdge {
    /// The subscription behind this edge. `None` only on the synthetic edges
    /// the back-edge pass adds and removes internally.
    pub subscription: Option<Subscription>,

    /// Set by the back-edge marking pass.
    pub back_edge: bool,

    /// Set alongside `back_edge`; every back edge closes a cycle.
    pub part_of_cycle: bool,

    /// Set by the longest-build-path marking pass.
    pub on_longest_build_path: bool,

    /// Marks flow that only carries tooling. Supplied by the caller; the
    /// path analyses ignore tooling-only edges.
    pub is_tooling_only: bool,
}

impl DependencyFlowEdge {
    pub(crate) fn new(subscription: Option<Subscription>) -> Self {
        DependencyFlowEdge {
            subscription,
            back_edge: false,
            part_of_cycle: false,
            on_longest_build_path: false,
            is_tooling_only: false,
        }
    }
}

/// Directed graph of dependency flow between (repository, branch) pairs.
///
/// Nodes are keyed case-insensitively by `repository@branch`; requesting the
/// same pair twice yields the same node. Removal keeps derived state
/// consistent: a target's `input_channels` always reflects its surviving
/// incoming edges.
#[derive(Debug, Default)]
pub struct DependencyFlowGraph {
    pub(crate) graph: StableDiGraph<DependencyFlowNode, DependencyFlowEdge>,
    node_keys: HashMap<String, NodeIndex>,
}

fn node_key(repository: &str, branch: &str) -> String {
    format!("{}@{}", normalize_key(repository), normalize_key(branch))
}

impl DependencyFlowGraph {
    /// Create an empty flow graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node by repository and branch, case-insensitively.
    #[must_use]
    pub fn find_node(&self, repository: &str, branch: &str) -> Option<NodeIndex> {
        self.node_keys.get(&node_key(repository, branch)).copied()
    }

    /// Node weight behind an index.
    ///
    /// # Panics
    ///
    /// Panics if the node was removed.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &DependencyFlowNode {
        &self.graph[index]
    }

    /// Mutable node weight, e.g. for flagging tooling-only repositories.
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut DependencyFlowNode {
        &mut self.graph[index]
    }

    /// Edge weight behind an index.
    ///
    /// # Panics
    ///
    /// Panics if the edge was removed.
    #[must_use]
    pub fn edge(&self, index: EdgeIndex) -> &DependencyFlowEdge {
        &self.graph[index]
    }

    /// Mutable edge weight, e.g. for flagging tooling-only flow.
    pub fn edge_mut(&mut self, index: EdgeIndex) -> &mut DependencyFlowEdge {
        &mut self.graph[index]
    }

    /// Source and target of an edge.
    #[must_use]
    pub fn edge_endpoints(&self, index: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(index)
    }

    /// All current node indices.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// All current edge indices.
    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Edges leaving `node`.
    pub fn outgoing_edges(&self, node: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| e.id())
    }

    /// Edges arriving at `node`.
    pub fn incoming_edges(&self, node: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.id())
    }

    pub(crate) fn get_or_create(&mut self, repository: &str, branch: &str) -> NodeIndex {
        let key = node_key(repository, branch);
        if let Some(&index) = self.node_keys.get(&key) {
            return index;
        }
        let index = self.graph.add_node(DependencyFlowNode::new(repository, branch));
        self.node_keys.insert(key, index);
        index
    }

    pub(crate) fn add_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        edge: DependencyFlowEdge,
    ) -> EdgeIndex {
        if let Some(subscription) = &edge.subscription {
            self.graph[target]
                .input_channels
                .insert(subscription.channel.name.clone());
        }
        self.graph.add_edge(source, target, edge)
    }

    /// Remove an edge and recompute the target's `input_channels` from its
    /// surviving incoming edges.
    pub fn remove_edge(&mut self, index: EdgeIndex) {
        let Some((_, target)) = self.graph.edge_endpoints(index) else {
            return;
        };
        self.graph.remove_edge(index);
        self.recompute_input_channels(target);
    }

    /// Remove a node with all its edges, keeping the `input_channels` of the
    /// nodes it fed consistent.
    pub fn remove_node(&mut self, index: NodeIndex) {
        let outgoing: Vec<EdgeIndex> = self.outgoing_edges(index).collect();
        for edge in outgoing {
            self.remove_edge(edge);
        }
        if let Some(node) = self.graph.remove_node(index) {
            self.node_keys.remove(&node_key(&node.repository, &node.branch));
        }
    }

    fn recompute_input_channels(&mut self, node: NodeIndex) {
        let channels: BTreeSet<String> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .filter_map(|e| e.weight().subscription.as_ref())
            .map(|s| s.channel.name.clone())
            .collect();
        self.graph[node].input_channels = channels;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, UpdateFrequency};

    fn subscription(id: &str, channel: &str) -> Subscription {
        Subscription {
            id: id.to_string(),
            enabled: true,
            source_repository: "https://github.com/org/src".to_string(),
            target_repository: "https://github.com/org/dst".to_string(),
            target_branch: "main".to_string(),
            channel: Channel {
                id: 1,
                name: channel.to_string(),
            },
            update_frequency: UpdateFrequency::EveryBuild,
        }
    }

    #[test]
    fn node_identity_is_case_insensitive() {
        let mut graph = DependencyFlowGraph::new();
        let a = graph.get_or_create("https://github.com/Org/Repo", "Main");
        let b = graph.get_or_create("https://github.com/org/repo", "main");
        assert_eq!(a, b);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn removing_an_edge_recomputes_input_channels() {
        let mut graph = DependencyFlowGraph::new();
        let src = graph.get_or_create("https://github.com/org/src", "main");
        let dst = graph.get_or_create("https://github.com/org/dst", "main");
        let e1 = graph.add_edge(
            src,
            dst,
            DependencyFlowEdge::new(Some(subscription("s1", "alpha"))),
        );
        graph.add_edge(
            src,
            dst,
            DependencyFlowEdge::new(Some(subscription("s2", "beta"))),
        );

        assert_eq!(graph.node(dst).input_channels.len(), 2);
        graph.remove_edge(e1);
        assert_eq!(
            graph.node(dst).input_channels.iter().collect::<Vec<_>>(),
            vec!["beta"]
        );
    }

    #[test]
    fn removing_a_node_updates_its_targets() {
        let mut graph = DependencyFlowGraph::new();
        let src = graph.get_or_create("https://github.com/org/src", "main");
        let dst = graph.get_or_create("https://github.com/org/dst", "main");
        graph.add_edge(
            src,
            dst,
            DependencyFlowEdge::new(Some(subscription("s1", "alpha"))),
        );

        graph.remove_node(src);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node(dst).input_channels.is_empty());
        assert!(graph.find_node("https://github.com/org/src", "main").is_none());
    }
}
