//! Collaborator contracts consumed by the graph engine.
//!
//! The engine never talks to the network itself; it consumes these two
//! object-safe async traits. Production implementations wrap the remote
//! repository hosts and the build registry service; [`crate::local`] provides
//! a filesystem-backed [`RepoRemote`] for offline builds.
//!
//! # Test Utilities
//!
//! This module provides [`MockRemote`] and [`MockRegistry`] for testing code
//! that depends on the collaborator traits. To use them in a downstream
//! crate, enable the `test-util` feature:
//!
//! ```toml
//! [dev-dependencies]
//! depflow = { version = "...", features = ["test-util"] }
//! ```

use crate::error::Result;
use crate::models::{Build, BuildTime, DefaultChannel, DependencyDetail, GitDiff, Subscription};
use async_trait::async_trait;

/// Read access to a source repository's declared dependencies and history.
///
/// Implementations must be `Send + Sync`; the trait is object-safe and is
/// consumed as `&dyn RepoRemote`.
///
/// # Error Handling
///
/// `get_dependencies` distinguishes recoverable per-node conditions from
/// infrastructure failures: `Error::DependencyFileNotFound` and
/// `Error::AppNotInstalled` mean "no dependency information available" and
/// the graph builder continues; anything else aborts the build.
#[async_trait]
pub trait RepoRemote: Send + Sync {
    /// Get the dependencies declared by `repo_uri` at `commit`.
    async fn get_dependencies(&self, repo_uri: &str, commit: &str)
    -> Result<Vec<DependencyDetail>>;

    /// Diff `to_commit` against `from_commit` in the given repository.
    ///
    /// Implementations return [`GitDiff::unknown`] when the comparison cannot
    /// be made and a no-op diff when the commits are equal.
    async fn git_diff(&self, repo_uri: &str, from_commit: &str, to_commit: &str)
    -> Result<GitDiff>;
}

/// Read access to the build registry: recorded builds, channel state and
/// aggregate build-time statistics.
#[async_trait]
pub trait BuildRegistry: Send + Sync {
    /// All builds recorded for `repo_uri` at `commit`.
    async fn get_builds(&self, repo_uri: &str, commit: &str) -> Result<Vec<Build>>;

    /// The latest build of `repo_uri` currently associated with the channel,
    /// or `None` if the channel holds no build of that repository.
    async fn get_latest_build(&self, repo_uri: &str, channel_id: i32) -> Result<Option<Build>>;

    /// Aggregate build-time statistics for a default channel over the last
    /// `days` days.
    async fn get_build_time(&self, default_channel_id: i32, days: u32) -> Result<BuildTime>;

    /// Default-channel mappings, optionally filtered by repository.
    async fn get_default_channels(&self, repository: Option<&str>) -> Result<Vec<DefaultChannel>>;

    /// Subscriptions, optionally filtered by source channel.
    async fn get_subscriptions(&self, channel_id: Option<i32>) -> Result<Vec<Subscription>>;
}

// ========== Test Utilities ==========

#[cfg(any(test, feature = "test-util"))]
mod mock {
    use super::{BuildRegistry, RepoRemote, async_trait};
    use crate::error::{Error, Result};
    use crate::models::{
        Build, BuildTime, DefaultChannel, DependencyDetail, GitDiff, Subscription,
    };
    use std::collections::HashMap;

    fn key(repo_uri: &str, commit: &str) -> String {
        format!("{}@{}", repo_uri.to_lowercase(), commit)
    }

    enum MockFetch {
        Dependencies(Vec<DependencyDetail>),
        FileNotFound,
        AppNotInstalled,
        Failure(String),
    }

    /// In-memory implementation of [`RepoRemote`] for tests.
    ///
    /// Configure per-(repository, commit) responses with the builder methods;
    /// unconfigured lookups report a missing manifest, so fixtures only need
    /// to describe the repositories that matter to the test.
    #[derive(Default)]
    pub struct MockRemote {
        responses: HashMap<String, MockFetch>,
    }

    impl MockRemote {
        /// Create an empty mock; every lookup reports a missing manifest.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Record the dependency list declared at (repo, commit).
        #[must_use]
        pub fn with_dependencies(
            mut self,
            repo_uri: &str,
            commit: &str,
            dependencies: Vec<DependencyDetail>,
        ) -> Self {
            self.responses
                .insert(key(repo_uri, commit), MockFetch::Dependencies(dependencies));
            self
        }

        /// Make (repo, commit) report a missing dependency manifest.
        #[must_use]
        pub fn with_missing_manifest(mut self, repo_uri: &str, commit: &str) -> Self {
            self.responses
                .insert(key(repo_uri, commit), MockFetch::FileNotFound);
            self
        }

        /// Make (repo, commit) report that the app is not installed.
        #[must_use]
        pub fn with_app_not_installed(mut self, repo_uri: &str, commit: &str) -> Self {
            self.responses
                .insert(key(repo_uri, commit), MockFetch::AppNotInstalled);
            self
        }

        /// Make (repo, commit) fail with an infrastructure error.
        #[must_use]
        pub fn with_failure(mut self, repo_uri: &str, commit: &str, message: &str) -> Self {
            self.responses
                .insert(key(repo_uri, commit), MockFetch::Failure(message.to_string()));
            self
        }
    }

    #[async_trait]
    impl RepoRemote for MockRemote {
        async fn get_dependencies(
            &self,
            repo_uri: &str,
            commit: &str,
        ) -> Result<Vec<DependencyDetail>> {
            match self.responses.get(&key(repo_uri, commit)) {
                Some(MockFetch::Dependencies(deps)) => Ok(deps.clone()),
                Some(MockFetch::AppNotInstalled) => Err(Error::AppNotInstalled {
                    repo: repo_uri.to_string(),
                }),
                Some(MockFetch::Failure(message)) => Err(Error::Remote(message.clone())),
                Some(MockFetch::FileNotFound) | None => Err(Error::DependencyFileNotFound {
                    repo: repo_uri.to_string(),
                    commit: commit.to_string(),
                }),
            }
        }

        async fn git_diff(
            &self,
            _repo_uri: &str,
            from_commit: &str,
            to_commit: &str,
        ) -> Result<GitDiff> {
            if from_commit == to_commit {
                return Ok(GitDiff::no_diff(from_commit));
            }
            Ok(GitDiff {
                base_commit: Some(from_commit.to_string()),
                target_commit: Some(to_commit.to_string()),
                ahead: 0,
                behind: 0,
                valid: true,
            })
        }
    }

    /// In-memory implementation of [`BuildRegistry`] for tests.
    #[derive(Default)]
    pub struct MockRegistry {
        builds: HashMap<String, Vec<Build>>,
        latest_builds: HashMap<(String, i32), Build>,
        build_times: HashMap<i32, BuildTime>,
        default_channels: Vec<DefaultChannel>,
        subscriptions: Vec<Subscription>,
    }

    impl MockRegistry {
        /// Create an empty registry.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Record a build for its (repository, commit) pair.
        #[must_use]
        pub fn with_build(mut self, build: Build) -> Self {
            self.builds
                .entry(key(&build.repository, &build.commit))
                .or_default()
                .push(build);
            self
        }

        /// Record the latest build of a repository in a channel.
        #[must_use]
        pub fn with_latest_build(mut self, channel_id: i32, build: Build) -> Self {
            self.latest_builds
                .insert((build.repository.to_lowercase(), channel_id), build);
            self
        }

        /// Record build-time statistics for a default channel.
        #[must_use]
        pub fn with_build_time(mut self, default_channel_id: i32, build_time: BuildTime) -> Self {
            self.build_times.insert(default_channel_id, build_time);
            self
        }

        /// Record a default-channel mapping.
        #[must_use]
        pub fn with_default_channel(mut self, default_channel: DefaultChannel) -> Self {
            self.default_channels.push(default_channel);
            self
        }

        /// Record a subscription.
        #[must_use]
        pub fn with_subscription(mut self, subscription: Subscription) -> Self {
            self.subscriptions.push(subscription);
            self
        }
    }

    #[async_trait]
    impl BuildRegistry for MockRegistry {
        async fn get_builds(&self, repo_uri: &str, commit: &str) -> Result<Vec<Build>> {
            Ok(self
                .builds
                .get(&key(repo_uri, commit))
                .cloned()
                .unwrap_or_default())
        }

        async fn get_latest_build(&self, repo_uri: &str, channel_id: i32) -> Result<Option<Build>> {
            Ok(self
                .latest_builds
                .get(&(repo_uri.to_lowercase(), channel_id))
                .cloned())
        }

        async fn get_build_time(&self, default_channel_id: i32, _days: u32) -> Result<BuildTime> {
            Ok(self
                .build_times
                .get(&default_channel_id)
                .copied()
                .unwrap_or_default())
        }

        async fn get_default_channels(
            &self,
            repository: Option<&str>,
        ) -> Result<Vec<DefaultChannel>> {
            Ok(self
                .default_channels
                .iter()
                .filter(|dc| {
                    repository.is_none_or(|r| dc.repository.eq_ignore_ascii_case(r))
                })
                .cloned()
                .collect())
        }

        async fn get_subscriptions(&self, channel_id: Option<i32>) -> Result<Vec<Subscription>> {
            Ok(self
                .subscriptions
                .iter()
                .filter(|s| channel_id.is_none_or(|id| s.channel.id == id))
                .cloned()
                .collect())
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockRegistry, MockRemote};
