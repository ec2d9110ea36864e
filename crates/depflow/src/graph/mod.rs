//! Concrete (repository, commit) dependency graphs.
//!
//! [`DependencyGraph`] is the result of transitively walking a repository's
//! declared dependencies. Nodes live in an arena addressed by [`NodeId`];
//! adjacency is stored as index lists, so parent/child back-references never
//! form ownership cycles.

mod build;
mod node;

pub use build::{DependencyGraphBuilder, GraphBuildOptions, NodeDiff};
pub use node::{DependencyGraph, DependencyGraphNode, NodeId};
