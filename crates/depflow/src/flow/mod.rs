//! Channel-level dependency flow graph.
//!
//! Where [`crate::graph`] walks declared dependencies commit by commit, this
//! module models how builds actually move between repositories: nodes are
//! (repository, branch) pairs, edges are the subscriptions that carry builds
//! from a source's publishing channel to a target branch. On top of the graph
//! sit the analyses: back-edge marking, longest-build-path calculation and
//! pruning down to the flow that feeds one channel.

mod analysis;
mod build;
mod graph;

pub use analysis::{is_interesting_edge, is_interesting_node};
pub use graph::{DependencyFlowEdge, DependencyFlowGraph, DependencyFlowNode, EdgeIndex, NodeIndex};
