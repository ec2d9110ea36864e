//! Breadth-first construction of the dependency graph.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    Build, DependencyDetail, DependencyKind, GitDiff, LooseDependencyKey, normalize_key,
    repo_commit_key,
};
use crate::remote::{BuildRegistry, RepoRemote};

use super::node::{DependencyGraph, DependencyGraphNode, NodeId};

/// How each node's commit is diffed against a reference commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeDiff {
    /// No diff computation.
    #[default]
    None,

    /// Diff every node of a repository against the node of that repository
    /// whose newest contributing build is globally newest.
    LatestInGraph,

    /// Diff every node against the latest build of its repository in the
    /// channel of its newest channel-bearing contributing build.
    LatestInChannel,
}

/// Options controlling a dependency graph build.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuildOptions {
    /// Traverse toolset dependencies as well as product ones.
    pub include_toolset: bool,

    /// Look up registry builds per node and attribute contributing builds.
    /// Requires a registry client.
    pub lookup_builds: bool,

    /// Diff mode. Anything but [`NodeDiff::None`] requires `lookup_builds`.
    pub node_diff: NodeDiff,

    /// Reconstruct the full node path of every cycle found. Off by default
    /// since path reconstruction is quadratic in deep graphs.
    pub compute_cycle_paths: bool,
}

/// Builds a [`DependencyGraph`] by walking declared dependencies breadth
/// first from a root (repository, commit).
///
/// ```no_run
/// # use depflow::graph::{DependencyGraphBuilder, GraphBuildOptions};
/// # use depflow::remote::RepoRemote;
/// # async fn demo(remote: &dyn RepoRemote) -> depflow::Result<()> {
/// let graph = DependencyGraphBuilder::new(remote, GraphBuildOptions::default())
///     .build("https://github.com/org/product", "3b1c9f2")
///     .await?;
/// println!("{} nodes", graph.node_count());
/// # Ok(())
/// # }
/// ```
pub struct DependencyGraphBuilder<'a> {
    remote: &'a dyn RepoRemote,
    registry: Option<&'a dyn BuildRegistry>,
    options: GraphBuildOptions,
    cancellation: CancellationToken,
}

impl<'a> DependencyGraphBuilder<'a> {
    /// Create a builder over a repository remote, with no registry access.
    #[must_use]
    pub fn new(remote: &'a dyn RepoRemote, options: GraphBuildOptions) -> Self {
        DependencyGraphBuilder {
            remote,
            registry: None,
            options,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach a build registry, enabling `lookup_builds` and diff modes.
    #[must_use]
    pub fn with_registry(mut self, registry: &'a dyn BuildRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Abort the build when `token` is cancelled. A cancelled build returns
    /// [`Error::Cancelled`], never a partial graph.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Build the graph rooted at (`root_repo_uri`, `root_commit`), fetching
    /// the root's own dependency manifest first.
    pub async fn build(&self, root_repo_uri: &str, root_commit: &str) -> Result<DependencyGraph> {
        self.build_impl(root_repo_uri, root_commit, None).await
    }

    /// Build the graph rooted at (`root_repo_uri`, `root_commit`) using an
    /// explicit, already-known dependency list for the root instead of
    /// fetching its manifest.
    pub async fn build_with_roots(
        &self,
        root_repo_uri: &str,
        root_commit: &str,
        root_dependencies: Vec<DependencyDetail>,
    ) -> Result<DependencyGraph> {
        if root_dependencies.is_empty() {
            return Err(Error::Config(
                "an explicit root dependency list must not be empty".to_string(),
            ));
        }
        self.build_impl(root_repo_uri, root_commit, Some(root_dependencies))
            .await
    }

    fn validate(&self) -> Result<()> {
        if self.registry.is_none()
            && (self.options.lookup_builds || self.options.node_diff != NodeDiff::None)
        {
            return Err(Error::Config(
                "build lookup and node diffing require a build registry".to_string(),
            ));
        }
        if self.options.node_diff != NodeDiff::None && !self.options.lookup_builds {
            return Err(Error::Config(
                "node diffing requires build lookup".to_string(),
            ));
        }
        Ok(())
    }

    async fn build_impl(
        &self,
        root_repo_uri: &str,
        root_commit: &str,
        root_dependencies: Option<Vec<DependencyDetail>>,
    ) -> Result<DependencyGraph> {
        self.validate()?;

        info!(
            repository = root_repo_uri,
            commit = root_commit,
            "building dependency graph"
        );

        let mut nodes: Vec<DependencyGraphNode> = Vec::new();
        let mut node_cache: HashMap<String, NodeId> = HashMap::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        let mut unique_seen: HashSet<DependencyDetail> = HashSet::new();
        let mut unique_dependencies: Vec<DependencyDetail> = Vec::new();

        // First occurrence of every dependency name, for incoherency checks.
        let mut first_by_name: HashMap<String, DependencyDetail> = HashMap::new();
        let mut incoherent_seen: HashSet<LooseDependencyKey> = HashSet::new();
        let mut incoherent_dependencies: Vec<DependencyDetail> = Vec::new();

        // First node of every repository URI, for incoherent node marking.
        let mut first_by_repo: HashMap<String, NodeId> = HashMap::new();
        let mut incoherent_node_seen: HashSet<NodeId> = HashSet::new();
        let mut incoherent_nodes: Vec<NodeId> = Vec::new();

        let mut cycles: Vec<Vec<NodeId>> = Vec::new();
        let mut builds_cache: HashMap<String, Vec<Build>> = HashMap::new();

        let mut root_visited = HashSet::new();
        root_visited.insert(normalize_key(root_repo_uri));
        let root = NodeId(0);
        nodes.push(DependencyGraphNode::new(
            root_repo_uri,
            root_commit,
            root_dependencies,
            root_visited,
        ));
        node_cache.insert(repo_commit_key(root_repo_uri, root_commit), root);
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            if self.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if nodes[current.0].dependencies.is_none() {
                let (repo, commit) = {
                    let node = &nodes[current.0];
                    (node.repository.clone(), node.commit.clone())
                };
                nodes[current.0].dependencies = self.fetch_dependencies(&repo, &commit).await?;
            }

            let Some(dependencies) = nodes[current.0].dependencies.clone() else {
                continue;
            };

            for dependency in dependencies {
                if !self.options.include_toolset && dependency.kind == DependencyKind::Toolset {
                    continue;
                }
                if !dependency.has_source_info() {
                    debug!(
                        dependency = %dependency,
                        "skipping dependency without source repository or commit"
                    );
                    continue;
                }

                // A dependency closing a cycle is not traversed and leaves
                // no trace in the dedup or incoherency bookkeeping.
                let dep_repo_key = normalize_key(&dependency.repo_uri);
                if nodes[current.0].visited_repos.contains(&dep_repo_key) {
                    debug!(
                        repository = %dependency.repo_uri,
                        "dependency closes a cycle, not traversing"
                    );
                    if self.options.compute_cycle_paths {
                        cycles.extend(cycle_paths(&nodes, current, &dep_repo_key));
                    }
                    continue;
                }

                if self.options.lookup_builds {
                    self.builds_for(&mut builds_cache, &dependency.repo_uri, &dependency.commit)
                        .await?;
                }

                if unique_seen.insert(dependency.clone()) {
                    unique_dependencies.push(dependency.clone());
                }

                let name_key = normalize_key(&dependency.name);
                match first_by_name.get(&name_key) {
                    None => {
                        first_by_name.insert(name_key, dependency.clone());
                    }
                    Some(first) => {
                        if first.version != dependency.version || first.commit != dependency.commit
                        {
                            for conflicting in [first.clone(), dependency.clone()] {
                                if incoherent_seen.insert(conflicting.loose_key()) {
                                    incoherent_dependencies.push(conflicting);
                                }
                            }
                        }
                    }
                }

                let cache_key = repo_commit_key(&dependency.repo_uri, &dependency.commit);
                if let Some(&existing) = node_cache.get(&cache_key) {
                    link(&mut nodes, current, existing, &dependency);
                    continue;
                }

                let mut visited = nodes[current.0].visited_repos.clone();
                visited.insert(dep_repo_key.clone());
                let child = NodeId(nodes.len());
                nodes.push(DependencyGraphNode::new(
                    &dependency.repo_uri,
                    &dependency.commit,
                    None,
                    visited,
                ));
                node_cache.insert(cache_key, child);
                link(&mut nodes, current, child, &dependency);
                queue.push_back(child);

                match first_by_repo.get(&dep_repo_key) {
                    None => {
                        first_by_repo.insert(dep_repo_key, child);
                    }
                    Some(&first) => {
                        if nodes[first.0].commit != nodes[child.0].commit {
                            for id in [first, child] {
                                if incoherent_node_seen.insert(id) {
                                    incoherent_nodes.push(id);
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut contributing_builds = Vec::new();
        if self.options.lookup_builds {
            contributing_builds = self
                .attribute_builds(&mut nodes, &mut builds_cache)
                .await?;
            match self.options.node_diff {
                NodeDiff::None => {}
                NodeDiff::LatestInGraph => self.diff_latest_in_graph(&mut nodes).await?,
                NodeDiff::LatestInChannel => self.diff_latest_in_channel(&mut nodes).await?,
            }
        }

        info!(
            nodes = nodes.len(),
            unique_dependencies = unique_dependencies.len(),
            incoherencies = incoherent_dependencies.len(),
            "dependency graph complete"
        );

        Ok(DependencyGraph {
            nodes,
            root,
            unique_dependencies,
            incoherent_nodes,
            incoherent_dependencies,
            contributing_builds,
            cycles,
        })
    }

    /// Fetch a node's dependency manifest. A missing manifest or an
    /// uninstalled app makes the node a leaf; any other error is fatal.
    async fn fetch_dependencies(
        &self,
        repo_uri: &str,
        commit: &str,
    ) -> Result<Option<Vec<DependencyDetail>>> {
        match self.remote.get_dependencies(repo_uri, commit).await {
            Ok(dependencies) => Ok(Some(dependencies)),
            Err(error) if error.is_missing_dependency_info() => {
                warn!(
                    repository = repo_uri,
                    commit, %error,
                    "no dependency information, treating node as a leaf"
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn builds_for<'c>(
        &self,
        cache: &'c mut HashMap<String, Vec<Build>>,
        repo_uri: &str,
        commit: &str,
    ) -> Result<&'c [Build]> {
        let registry = self.registry.ok_or_else(|| {
            Error::Config("build lookup requires a build registry".to_string())
        })?;
        let key = repo_commit_key(repo_uri, commit);
        if !cache.contains_key(&key) {
            let builds = registry.get_builds(repo_uri, commit).await?;
            cache.insert(key.clone(), builds);
        }
        Ok(&cache[&key])
    }

    /// Attribute registry builds to nodes. A build contributes to a node when
    /// the node has no parents, or some incoming dependency entry names an
    /// asset the build produced. Two builds producing identical assets both
    /// contribute; the ambiguity is preserved.
    async fn attribute_builds(
        &self,
        nodes: &mut [DependencyGraphNode],
        builds_cache: &mut HashMap<String, Vec<Build>>,
    ) -> Result<Vec<Build>> {
        let mut graph_builds: Vec<Build> = Vec::new();
        let mut graph_build_ids: HashSet<i32> = HashSet::new();

        for id in 0..nodes.len() {
            let (repo, commit) = {
                let n = &nodes[id];
                (n.repository.clone(), n.commit.clone())
            };
            let candidates = self.builds_for(builds_cache, &repo, &commit).await?.to_vec();

            let incoming: Vec<DependencyDetail> = nodes[id]
                .parents
                .clone()
                .into_iter()
                .flat_map(|p| {
                    nodes[p.0]
                        .children
                        .iter()
                        .filter(|(child, _)| child.0 == id)
                        .map(|(_, detail)| detail.clone())
                        .collect::<Vec<_>>()
                })
                .collect();

            let contributing: Vec<Build> = candidates
                .into_iter()
                .filter(|build| {
                    incoming.is_empty() || incoming.iter().any(|detail| build.produced(detail))
                })
                .collect();

            for build in &contributing {
                if graph_build_ids.insert(build.id) {
                    graph_builds.push(build.clone());
                }
            }
            nodes[id].contributing_builds = contributing;
        }

        Ok(graph_builds)
    }

    async fn diff_latest_in_graph(&self, nodes: &mut [DependencyGraphNode]) -> Result<()> {
        let mut by_repo: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            by_repo
                .entry(normalize_key(&node.repository))
                .or_default()
                .push(i);
        }

        for group in by_repo.values() {
            if group.len() == 1 {
                let node = &mut nodes[group[0]];
                let commit = node.commit.clone();
                node.diff_from = Some(GitDiff::no_diff(&commit));
                continue;
            }

            let reference = group
                .iter()
                .filter_map(|&i| {
                    nodes[i]
                        .contributing_builds
                        .iter()
                        .map(|b| b.date_produced)
                        .max()
                        .map(|newest| (i, newest))
                })
                .max_by_key(|&(_, newest)| newest)
                .map(|(i, _)| i);

            let Some(reference) = reference else {
                // Nothing to anchor the comparison on.
                for &i in group {
                    nodes[i].diff_from = Some(GitDiff::unknown());
                }
                continue;
            };

            let reference_commit = nodes[reference].commit.clone();
            for &i in group {
                if i == reference {
                    nodes[i].diff_from = Some(GitDiff::no_diff(&reference_commit));
                } else {
                    let diff = self
                        .remote
                        .git_diff(&nodes[i].repository, &nodes[i].commit, &reference_commit)
                        .await?;
                    nodes[i].diff_from = Some(diff);
                }
            }
        }
        Ok(())
    }

    async fn diff_latest_in_channel(&self, nodes: &mut [DependencyGraphNode]) -> Result<()> {
        let registry = self.registry.ok_or_else(|| {
            Error::Config("channel diffing requires a build registry".to_string())
        })?;
        let mut latest_cache: HashMap<String, Option<Build>> = HashMap::new();

        for id in 0..nodes.len() {
            let channel_id = nodes[id]
                .contributing_builds
                .iter()
                .filter(|b| !b.channels.is_empty())
                .max_by_key(|b| b.date_produced)
                .map(|b| b.channels[0].id);

            let Some(channel_id) = channel_id else {
                nodes[id].diff_from = Some(GitDiff::unknown());
                continue;
            };

            let repo = nodes[id].repository.clone();
            let cache_key = format!("{}@{}", normalize_key(&repo), channel_id);
            if !latest_cache.contains_key(&cache_key) {
                let latest = registry.get_latest_build(&repo, channel_id).await?;
                latest_cache.insert(cache_key.clone(), latest);
            }

            nodes[id].diff_from = Some(match &latest_cache[&cache_key] {
                Some(latest) => {
                    let commit = nodes[id].commit.clone();
                    self.remote.git_diff(&repo, &commit, &latest.commit).await?
                }
                None => GitDiff::unknown(),
            });
        }
        Ok(())
    }
}

/// Add a parent→child edge, deduplicating both directions.
fn link(
    nodes: &mut [DependencyGraphNode],
    parent: NodeId,
    child: NodeId,
    dependency: &DependencyDetail,
) {
    let entry = (child, dependency.clone());
    let p = &mut nodes[parent.0];
    if !p.children.contains(&entry) {
        p.children.push(entry);
    }
    let c = &mut nodes[child.0];
    if !c.parents.contains(&parent) {
        c.parents.push(parent);
    }
}

/// Reconstruct every root-to-`current` path of a detected cycle. The cycle
/// root is the node whose repository the offending dependency points back to;
/// paths run topmost node first with `current` appended last.
fn cycle_paths(
    nodes: &[DependencyGraphNode],
    current: NodeId,
    cycle_root_repo: &str,
) -> Vec<Vec<NodeId>> {
    let node = &nodes[current.0];
    if normalize_key(&node.repository) == cycle_root_repo {
        return vec![vec![current]];
    }

    let mut paths = Vec::new();
    for &parent in &node.parents {
        if nodes[parent.0].visited_repos.contains(cycle_root_repo) {
            for mut path in cycle_paths(nodes, parent, cycle_root_repo) {
                path.push(current);
                paths.push(path);
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Asset, Channel};
    use crate::remote::{MockRegistry, MockRemote};
    use chrono::{TimeZone, Utc};

    const REPO_A: &str = "https://github.com/org/a";
    const REPO_B: &str = "https://github.com/org/b";
    const REPO_C: &str = "https://github.com/org/c";

    fn dep(name: &str, version: &str, commit: &str, repo: &str) -> DependencyDetail {
        DependencyDetail {
            name: name.to_string(),
            version: version.to_string(),
            commit: commit.to_string(),
            repo_uri: repo.to_string(),
            kind: DependencyKind::Product,
        }
    }

    fn toolset(name: &str, version: &str, commit: &str, repo: &str) -> DependencyDetail {
        DependencyDetail {
            kind: DependencyKind::Toolset,
            ..dep(name, version, commit, repo)
        }
    }

    fn build(id: i32, repo: &str, commit: &str, assets: &[(&str, &str)]) -> Build {
        Build {
            id,
            repository: repo.to_string(),
            commit: commit.to_string(),
            date_produced: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, id as u32 % 60).unwrap(),
            channels: Vec::new(),
            assets: assets
                .iter()
                .map(|(name, version)| Asset {
                    name: (*name).to_string(),
                    version: (*version).to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn same_repo_commit_produces_one_node() {
        // A depends on B and C; both depend on the same D commit.
        let shared = dep("D", "1.0.0", "d1", "https://github.com/org/d");
        let remote = MockRemote::new()
            .with_dependencies(
                REPO_A,
                "a1",
                vec![dep("B", "1.0.0", "b1", REPO_B), dep("C", "1.0.0", "c1", REPO_C)],
            )
            .with_dependencies(REPO_B, "b1", vec![shared.clone()])
            .with_dependencies(REPO_C, "c1", vec![shared.clone()]);

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();

        assert_eq!(graph.node_count(), 4);
        let d = graph
            .nodes()
            .find(|(_, n)| n.repository == "https://github.com/org/d")
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(graph.node(d).parents().len(), 2);
    }

    #[tokio::test]
    async fn cycle_terminates_and_is_reported() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B", "1.0.0", "b1", REPO_B)])
            .with_dependencies(REPO_B, "b1", vec![dep("A", "2.0.0", "a2", REPO_A)]);

        let options = GraphBuildOptions {
            compute_cycle_paths: true,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .build(REPO_A, "a1")
            .await
            .unwrap();

        // B's dependency back onto A is not traversed.
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.cycles().len(), 1);
        let path: Vec<&str> = graph.cycles()[0]
            .iter()
            .map(|&id| graph.node(id).repository.as_str())
            .collect();
        assert_eq!(path, vec![REPO_A, REPO_B]);
    }

    #[tokio::test]
    async fn cycle_closing_dependency_leaves_no_bookkeeping_trace() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B", "1.0.0", "b1", REPO_B)])
            .with_dependencies(REPO_B, "b1", vec![dep("A", "2.0.0", "a2", REPO_A)]);

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();

        // Only the traversed dependency is recorded; the edge back onto A
        // appears in neither the unique set nor the incoherency lists.
        assert_eq!(graph.unique_dependencies().len(), 1);
        assert_eq!(graph.unique_dependencies()[0].name, "B");
        assert!(graph.incoherent_dependencies().is_empty());
        assert!(graph.incoherent_nodes().is_empty());
    }

    #[tokio::test]
    async fn toolset_dependencies_are_skipped_by_default() {
        let remote = MockRemote::new().with_dependencies(
            REPO_A,
            "a1",
            vec![
                dep("B", "1.0.0", "b1", REPO_B),
                toolset("Tool", "1.0.0", "c1", REPO_C),
            ],
        );

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 2);

        let options = GraphBuildOptions {
            include_toolset: true,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .build(REPO_A, "a1")
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 3);
    }

    #[tokio::test]
    async fn missing_manifest_makes_a_leaf() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B", "1.0.0", "b1", REPO_B)])
            .with_missing_manifest(REPO_B, "b1");

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();

        assert_eq!(graph.node_count(), 2);
        let (_, b) = graph
            .nodes()
            .find(|(_, n)| n.repository == REPO_B)
            .unwrap();
        assert!(b.dependencies.is_none());
    }

    #[tokio::test]
    async fn app_not_installed_makes_a_leaf() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B", "1.0.0", "b1", REPO_B)])
            .with_app_not_installed(REPO_B, "b1");

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();

        assert_eq!(graph.node_count(), 2);
        let (_, b) = graph
            .nodes()
            .find(|(_, n)| n.repository == REPO_B)
            .unwrap();
        assert!(b.dependencies.is_none());
    }

    #[tokio::test]
    async fn infrastructure_failure_is_fatal() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B", "1.0.0", "b1", REPO_B)])
            .with_failure(REPO_B, "b1", "connection reset");

        let err = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[tokio::test]
    async fn name_collision_is_incoherent() {
        let remote = MockRemote::new()
            .with_dependencies(
                REPO_A,
                "a1",
                vec![
                    dep("B", "1.0.0", "b1", REPO_B),
                    dep("Shared", "1.0.0", "s1", "https://github.com/org/s"),
                ],
            )
            .with_dependencies(
                REPO_B,
                "b1",
                vec![dep("Shared", "2.0.0", "s2", "https://github.com/org/s")],
            );

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();

        // Both versions of Shared are recorded.
        assert_eq!(graph.incoherent_dependencies().len(), 2);
        let versions: Vec<&str> = graph
            .incoherent_dependencies()
            .iter()
            .map(|d| d.version.as_str())
            .collect();
        assert!(versions.contains(&"1.0.0") && versions.contains(&"2.0.0"));

        // Two nodes of org/s at different commits are incoherent nodes.
        assert_eq!(graph.incoherent_nodes().len(), 2);
    }

    #[tokio::test]
    async fn coherent_graph_reports_no_incoherencies() {
        let shared = dep("Shared", "1.0.0", "s1", "https://github.com/org/s");
        let remote = MockRemote::new()
            .with_dependencies(
                REPO_A,
                "a1",
                vec![dep("B", "1.0.0", "b1", REPO_B), shared.clone()],
            )
            .with_dependencies(REPO_B, "b1", vec![shared.clone()]);

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();

        assert!(graph.incoherent_dependencies().is_empty());
        assert!(graph.incoherent_nodes().is_empty());
        assert_eq!(graph.unique_dependencies().len(), 2);
    }

    #[tokio::test]
    async fn dependency_without_source_info_is_skipped() {
        let remote = MockRemote::new().with_dependencies(
            REPO_A,
            "a1",
            vec![dep("Nameless", "1.0.0", "", ""), dep("B", "1.0.0", "b1", REPO_B)],
        );

        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build(REPO_A, "a1")
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.unique_dependencies().len(), 1);
    }

    #[tokio::test]
    async fn remote_only_options_require_a_registry() {
        let remote = MockRemote::new();
        let options = GraphBuildOptions {
            lookup_builds: true,
            ..GraphBuildOptions::default()
        };
        let err = DependencyGraphBuilder::new(&remote, options)
            .build(REPO_A, "a1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn node_diff_requires_build_lookup() {
        let remote = MockRemote::new();
        let registry = MockRegistry::new();
        let options = GraphBuildOptions {
            node_diff: NodeDiff::LatestInGraph,
            ..GraphBuildOptions::default()
        };
        let err = DependencyGraphBuilder::new(&remote, options)
            .with_registry(&registry)
            .build(REPO_A, "a1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn empty_explicit_root_dependencies_are_rejected() {
        let remote = MockRemote::new();
        let err = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build_with_roots(REPO_A, "a1", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn explicit_root_dependencies_skip_the_root_manifest() {
        // Remote knows nothing about the root; explicit roots drive it.
        let remote =
            MockRemote::new().with_dependencies(REPO_B, "b1", Vec::new());
        let graph = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .build_with_roots(REPO_A, "a1", vec![dep("B", "1.0.0", "b1", REPO_B)])
            .await
            .unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(graph.root()).repository, REPO_A);
    }

    #[tokio::test]
    async fn contributing_builds_match_parent_assets() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B.Package", "1.0.0", "b1", REPO_B)])
            .with_dependencies(REPO_B, "b1", Vec::new());
        let registry = MockRegistry::new()
            .with_build(build(1, REPO_A, "a1", &[("A.Package", "5.0.0")]))
            .with_build(build(2, REPO_B, "b1", &[("B.Package", "1.0.0")]))
            .with_build(build(3, REPO_B, "b1", &[("B.Package", "9.9.9")]));

        let options = GraphBuildOptions {
            lookup_builds: true,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .with_registry(&registry)
            .build(REPO_A, "a1")
            .await
            .unwrap();

        // Root has no parents, so its build contributes unconditionally.
        let root = graph.node(graph.root());
        assert_eq!(root.contributing_builds.len(), 1);

        // Only the build whose asset version matches the declared dependency
        // contributes to B.
        let (_, b) = graph.nodes().find(|(_, n)| n.repository == REPO_B).unwrap();
        assert_eq!(b.contributing_builds.len(), 1);
        assert_eq!(b.contributing_builds[0].id, 2);

        assert_eq!(graph.contributing_builds().len(), 2);
    }

    #[tokio::test]
    async fn ambiguous_builds_both_contribute() {
        let remote = MockRemote::new()
            .with_dependencies(REPO_A, "a1", vec![dep("B.Package", "1.0.0", "b1", REPO_B)])
            .with_dependencies(REPO_B, "b1", Vec::new());
        let registry = MockRegistry::new()
            .with_build(build(2, REPO_B, "b1", &[("B.Package", "1.0.0")]))
            .with_build(build(3, REPO_B, "b1", &[("B.Package", "1.0.0")]));

        let options = GraphBuildOptions {
            lookup_builds: true,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .with_registry(&registry)
            .build(REPO_A, "a1")
            .await
            .unwrap();

        let (_, b) = graph.nodes().find(|(_, n)| n.repository == REPO_B).unwrap();
        assert_eq!(b.contributing_builds.len(), 2);
    }

    #[tokio::test]
    async fn latest_in_graph_diffs_against_newest_build() {
        // A depends on two commits of B through an intermediate repo.
        let remote = MockRemote::new()
            .with_dependencies(
                REPO_A,
                "a1",
                vec![
                    dep("C.Package", "1.0.0", "c1", REPO_C),
                    dep("B.Package", "1.0.0", "b1", REPO_B),
                ],
            )
            .with_dependencies(REPO_C, "c1", vec![dep("B.Package", "2.0.0", "b2", REPO_B)])
            .with_dependencies(REPO_B, "b1", Vec::new())
            .with_dependencies(REPO_B, "b2", Vec::new());

        let mut older = build(1, REPO_B, "b1", &[("B.Package", "1.0.0")]);
        older.date_produced = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut newer = build(2, REPO_B, "b2", &[("B.Package", "2.0.0")]);
        newer.date_produced = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let registry = MockRegistry::new().with_build(older).with_build(newer);

        let options = GraphBuildOptions {
            lookup_builds: true,
            node_diff: NodeDiff::LatestInGraph,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .with_registry(&registry)
            .build(REPO_A, "a1")
            .await
            .unwrap();

        let (_, b1) = graph
            .nodes()
            .find(|(_, n)| n.repository == REPO_B && n.commit == "b1")
            .unwrap();
        let (_, b2) = graph
            .nodes()
            .find(|(_, n)| n.repository == REPO_B && n.commit == "b2")
            .unwrap();

        // b2 carries the newest build, so it is the reference.
        assert_eq!(b2.diff_from, Some(GitDiff::no_diff("b2")));
        let b1_diff = b1.diff_from.clone().unwrap();
        assert_eq!(b1_diff.base_commit.as_deref(), Some("b1"));
        assert_eq!(b1_diff.target_commit.as_deref(), Some("b2"));
    }

    #[tokio::test]
    async fn latest_in_channel_diffs_against_channel_head() {
        let remote = MockRemote::new().with_dependencies(REPO_A, "a1", Vec::new());

        let mut root_build = build(1, REPO_A, "a1", &[("A.Package", "1.0.0")]);
        root_build.channels = vec![Channel {
            id: 42,
            name: ".NET Eng - Latest".to_string(),
        }];
        let channel_head = build(9, REPO_A, "a9", &[("A.Package", "9.0.0")]);

        let registry = MockRegistry::new()
            .with_build(root_build)
            .with_latest_build(42, channel_head);

        let options = GraphBuildOptions {
            lookup_builds: true,
            node_diff: NodeDiff::LatestInChannel,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .with_registry(&registry)
            .build(REPO_A, "a1")
            .await
            .unwrap();

        let diff = graph.node(graph.root()).diff_from.clone().unwrap();
        assert_eq!(diff.base_commit.as_deref(), Some("a1"));
        assert_eq!(diff.target_commit.as_deref(), Some("a9"));
    }

    #[tokio::test]
    async fn node_without_channel_build_gets_unknown_diff() {
        let remote = MockRemote::new().with_dependencies(REPO_A, "a1", Vec::new());
        let registry =
            MockRegistry::new().with_build(build(1, REPO_A, "a1", &[("A.Package", "1.0.0")]));

        let options = GraphBuildOptions {
            lookup_builds: true,
            node_diff: NodeDiff::LatestInChannel,
            ..GraphBuildOptions::default()
        };
        let graph = DependencyGraphBuilder::new(&remote, options)
            .with_registry(&registry)
            .build(REPO_A, "a1")
            .await
            .unwrap();

        assert_eq!(
            graph.node(graph.root()).diff_from,
            Some(GitDiff::unknown())
        );
    }

    #[tokio::test]
    async fn cancelled_build_returns_no_partial_graph() {
        let remote = MockRemote::new().with_dependencies(REPO_A, "a1", Vec::new());
        let token = CancellationToken::new();
        token.cancel();

        let err = DependencyGraphBuilder::new(&remote, GraphBuildOptions::default())
            .with_cancellation(token)
            .build(REPO_A, "a1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
