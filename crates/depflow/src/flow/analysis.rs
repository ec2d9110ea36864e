//! Analyses over the flow graph: back edges, longest build paths, pruning.

use std::collections::{HashSet, VecDeque};

use fixedbitset::FixedBitSet;
use petgraph::Direction;
use petgraph::visit::{EdgeRef, NodeIndexable};
use tracing::debug;

use crate::models::UpdateFrequency;

use super::graph::{
    DependencyFlowEdge, DependencyFlowGraph, DependencyFlowNode, EdgeIndex, NodeIndex,
};

impl DependencyFlowGraph {
    /// Mark every edge that closes a cycle.
    ///
    /// Flow graphs are cyclic in practice (tooling flows back into the
    /// repositories that produce it), but most analyses want the acyclic
    /// skeleton. An edge From→To is a back edge when every path from To out
    /// of the graph passes through From; the set of non-back edges is
    /// guaranteed acyclic. Node and edge counts are unchanged by this pass.
    pub fn mark_back_edges(&mut self) {
        if self.node_count() == 0 {
            return;
        }

        let sinks: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect();

        // Synthetic exit node behind every sink, so the dominator walk has a
        // single entry when the graph is read against the edge direction.
        let start = self.graph.add_node(DependencyFlowNode::new("", ""));
        for &sink in &sinks {
            self.graph
                .add_edge(sink, start, DependencyFlowEdge::new(None));
        }

        let bound = self.graph.node_bound();
        let mut full = FixedBitSet::with_capacity(bound);
        for n in self.graph.node_indices() {
            full.insert(self.graph.to_index(n));
        }

        let start_index = self.graph.to_index(start);
        let mut dominators: Vec<FixedBitSet> = vec![full; bound];
        let mut start_only = FixedBitSet::with_capacity(bound);
        start_only.insert(start_index);
        dominators[start_index] = start_only;

        let mut worklist: VecDeque<NodeIndex> = self
            .graph
            .neighbors_directed(start, Direction::Incoming)
            .collect();
        while let Some(n) = worklist.pop_front() {
            if n == start {
                continue;
            }
            let n_index = self.graph.to_index(n);

            // Read against the edge direction: this node's predecessors are
            // the targets of its outgoing edges.
            let mut updated: Option<FixedBitSet> = None;
            for pred in self.graph.neighbors_directed(n, Direction::Outgoing) {
                let pred_index = self.graph.to_index(pred);
                match &mut updated {
                    None => updated = Some(dominators[pred_index].clone()),
                    Some(set) => set.intersect_with(&dominators[pred_index]),
                }
            }
            let mut updated = updated.unwrap_or_else(|| FixedBitSet::with_capacity(bound));
            updated.insert(n_index);

            if updated != dominators[n_index] {
                dominators[n_index] = updated;
                for next in self.graph.neighbors_directed(n, Direction::Incoming) {
                    worklist.push_back(next);
                }
            }
        }

        let edges: Vec<(EdgeIndex, NodeIndex, NodeIndex)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e).map(|(s, t)| (e, s, t)))
            .filter(|&(_, _, target)| target != start)
            .collect();
        let mut marked = 0usize;
        for (edge, from, to) in edges {
            if dominators[self.graph.to_index(to)].contains(self.graph.to_index(from)) {
                let weight = &mut self.graph[edge];
                weight.back_edge = true;
                weight.part_of_cycle = true;
                marked += 1;
            }
        }
        debug!(back_edges = marked, "back edge marking complete");

        // Dropping the synthetic node drops its edges with it.
        self.graph.remove_node(start);
    }

    /// Compute best- and worst-case path times for every node.
    ///
    /// Roots of the flow (nodes with no outgoing edges) cost just their own
    /// official build; every other node adds its official build on top of
    /// the slowest downstream path, plus (in the worst case) the downstream
    /// node's dependency-update PR time. Tooling-only edges do not count,
    /// and back edges are skipped so the walk sees the acyclic skeleton;
    /// when every outgoing edge is a back edge the full outgoing list is
    /// used instead. Expects [`Self::mark_back_edges`] to have run.
    pub fn calculate_longest_build_paths(&mut self) {
        let all: Vec<NodeIndex> = self.graph.node_indices().collect();
        for &n in &all {
            let node = &mut self.graph[n];
            node.best_case_path_time = 0.0;
            node.worst_case_path_time = 0.0;
        }

        let mut queue: VecDeque<(NodeIndex, HashSet<NodeIndex>)> = all
            .iter()
            .filter(|&&n| {
                self.graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|&n| (n, HashSet::new()))
            .collect();

        while let Some((n, mut visited)) = queue.pop_front() {
            let outgoing: Vec<(bool, bool, NodeIndex)> = self
                .graph
                .edges_directed(n, Direction::Outgoing)
                .map(|e| (e.weight().back_edge, e.weight().is_tooling_only, e.target()))
                .collect();
            let all_back = !outgoing.is_empty() && outgoing.iter().all(|&(back, _, _)| back);

            let mut best_downstream = 0.0f64;
            let mut worst_downstream = 0.0f64;
            for &(back, tooling, target) in &outgoing {
                if tooling || (back && !all_back) {
                    continue;
                }
                let target = &self.graph[target];
                best_downstream = best_downstream.max(target.best_case_path_time);
                worst_downstream =
                    worst_downstream.max(target.worst_case_path_time + target.pr_build_time);
            }

            let node = &mut self.graph[n];
            node.best_case_path_time = node.official_build_time + best_downstream;
            node.worst_case_path_time = node.official_build_time + worst_downstream;

            visited.insert(n);
            let upstream: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(n, Direction::Incoming)
                .collect();
            for pred in upstream {
                if !visited.contains(&pred) && !queue.iter().any(|(queued, _)| *queued == pred) {
                    queue.push_back((pred, visited.clone()));
                }
            }
        }
    }

    /// Mark the single longest build path.
    ///
    /// Starts at the non-tooling node with the largest best-case path time
    /// and greedily follows, among unmarked non-back non-tooling outgoing
    /// edges, the one leading to the largest downstream best case. Expects
    /// [`Self::mark_back_edges`] and
    /// [`Self::calculate_longest_build_paths`] to have run.
    pub fn mark_longest_build_path(&mut self) {
        let start = self
            .graph
            .node_indices()
            .filter(|&n| !self.graph[n].is_tooling_only)
            .max_by(|&a, &b| {
                self.graph[a]
                    .best_case_path_time
                    .total_cmp(&self.graph[b].best_case_path_time)
            });
        let Some(mut current) = start else {
            return;
        };

        self.graph[current].on_longest_build_path = true;
        loop {
            let next = self
                .graph
                .edges_directed(current, Direction::Outgoing)
                .filter(|e| {
                    let weight = e.weight();
                    !weight.on_longest_build_path && !weight.back_edge && !weight.is_tooling_only
                })
                .max_by(|a, b| {
                    self.graph[a.target()]
                        .best_case_path_time
                        .total_cmp(&self.graph[b.target()].best_case_path_time)
                })
                .map(|e| (e.id(), e.target()));

            let Some((edge, target)) = next else {
                break;
            };
            self.graph[edge].on_longest_build_path = true;
            self.graph[target].on_longest_build_path = true;
            current = target;
        }
    }

    /// Remove everything that does not feed an interesting node.
    ///
    /// Walks backward from every node satisfying `interesting_node` along
    /// edges satisfying `interesting_edge`; unreached nodes, and surviving
    /// edges that do not satisfy the predicate, are removed through the
    /// consistency-preserving removal operations.
    pub fn prune(
        &mut self,
        interesting_node: impl Fn(&DependencyFlowNode) -> bool,
        interesting_edge: impl Fn(&DependencyFlowEdge) -> bool,
    ) {
        let mut keep_nodes: HashSet<NodeIndex> = HashSet::new();
        let mut keep_edges: HashSet<EdgeIndex> = HashSet::new();

        let mut stack: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| interesting_node(&self.graph[n]))
            .collect();
        while let Some(n) = stack.pop() {
            if !keep_nodes.insert(n) {
                continue;
            }
            for edge in self.graph.edges_directed(n, Direction::Incoming) {
                if interesting_edge(edge.weight()) {
                    keep_edges.insert(edge.id());
                    stack.push(edge.source());
                }
            }
        }

        let doomed_nodes: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| !keep_nodes.contains(n))
            .collect();
        for n in doomed_nodes {
            self.remove_node(n);
        }

        let doomed_edges: Vec<EdgeIndex> = self
            .graph
            .edge_indices()
            .filter(|e| !keep_edges.contains(e))
            .collect();
        for e in doomed_edges {
            self.remove_edge(e);
        }
    }
}

/// Stock node predicate for [`DependencyFlowGraph::prune`]: the node
/// publishes to the channel under investigation.
#[must_use]
pub fn is_interesting_node(target_channel: &str, node: &DependencyFlowNode) -> bool {
    node.output_channels.contains(target_channel)
}

/// Stock edge predicate for [`DependencyFlowGraph::prune`]: the subscription
/// is enabled (or disabled ones were requested) and updates at one of the
/// requested frequencies.
#[must_use]
pub fn is_interesting_edge(
    edge: &DependencyFlowEdge,
    include_disabled: bool,
    frequencies: &[UpdateFrequency],
) -> bool {
    edge.subscription
        .as_ref()
        .is_some_and(|s| (s.enabled || include_disabled) && frequencies.contains(&s.update_frequency))
}
