//! Assembling the flow graph from registry state.

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{DefaultChannel, Subscription};
use crate::remote::BuildRegistry;

use super::graph::{DependencyFlowEdge, DependencyFlowGraph, NodeIndex};

/// Concurrent in-flight build-time lookups.
const BUILD_TIME_CONCURRENCY: usize = 8;

impl DependencyFlowGraph {
    /// Assemble a flow graph from default-channel mappings and subscriptions.
    ///
    /// Every default channel becomes (or extends) a node publishing to that
    /// channel; every subscription becomes edges from the branches publishing
    /// to its source channel into its target branch. Build-time statistics
    /// over the last `days` days are attached to nodes created from default
    /// channels with a registry identity; entries without one keep zeros.
    pub async fn build(
        default_channels: Vec<DefaultChannel>,
        subscriptions: Vec<Subscription>,
        registry: &dyn BuildRegistry,
        days: u32,
    ) -> Result<DependencyFlowGraph> {
        let mut graph = DependencyFlowGraph::new();

        let mut time_lookups: Vec<(NodeIndex, i32)> = Vec::new();
        for default_channel in &default_channels {
            let node = graph.get_or_create(&default_channel.repository, &default_channel.branch);
            graph
                .node_mut(node)
                .output_channels
                .insert(default_channel.channel.name.clone());
            if default_channel.id != 0 {
                time_lookups.push((node, default_channel.id));
            }
        }

        let build_times = stream::iter(time_lookups.into_iter().map(|(node, id)| async move {
            registry.get_build_time(id, days).await.map(|bt| (node, bt))
        }))
        .buffer_unordered(BUILD_TIME_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;

        for result in build_times {
            let (node, build_time) = result?;
            let weight = graph.node_mut(node);
            weight.official_build_time = build_time.official_minutes;
            weight.pr_build_time = build_time.pr_minutes;
            weight.goal_time_in_minutes = build_time.goal_minutes;
        }

        for subscription in &subscriptions {
            let target = graph.get_or_create(
                &subscription.target_repository,
                &subscription.target_branch,
            );
            graph
                .node_mut(target)
                .input_channels
                .insert(subscription.channel.name.clone());

            for default_channel in &default_channels {
                if default_channel.channel.name == subscription.channel.name
                    && default_channel
                        .repository
                        .eq_ignore_ascii_case(&subscription.source_repository)
                {
                    let source =
                        graph.get_or_create(&default_channel.repository, &default_channel.branch);
                    debug!(
                        source = %default_channel.repository,
                        target = %subscription.target_repository,
                        channel = %subscription.channel.name,
                        frequency = subscription.update_frequency.as_str(),
                        "subscription edge added"
                    );
                    graph.add_edge(
                        source,
                        target,
                        DependencyFlowEdge::new(Some(subscription.clone())),
                    );
                }
            }
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "flow graph assembled"
        );
        Ok(graph)
    }
}
