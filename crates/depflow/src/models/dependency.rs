//! Declared-dependency value types and their equality rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a declared dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// A shipping product dependency.
    Product,

    /// A build-tooling dependency, excluded from product flow reasoning.
    Toolset,
}

/// A single dependency as declared in a repository's manifest.
///
/// Two equivalence relations exist over details:
///
/// - **strict** (the derived `PartialEq`/`Hash`): name, version, commit,
///   repository URI and kind all match. Used for graph-wide deduplication.
/// - **loose** ([`LooseDependencyKey`]): name, version and commit only,
///   ignoring the proclaimed source repository. Used to find the same logical
///   dependency appearing from two different sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDetail {
    /// Dependency (asset) name.
    pub name: String,

    /// Version of the dependency.
    pub version: String,

    /// Commit the dependency was produced from. May be empty for malformed
    /// entries, which the graph builder skips.
    pub commit: String,

    /// URI of the repository that produced the dependency. May be empty for
    /// malformed entries.
    pub repo_uri: String,

    /// Product or toolset.
    pub kind: DependencyKind,
}

impl DependencyDetail {
    /// Loose identity of this dependency: name, version and commit only.
    /// The name is lowercased so keys compare case-insensitively.
    #[must_use]
    pub fn loose_key(&self) -> LooseDependencyKey {
        LooseDependencyKey {
            name: self.name.to_lowercase(),
            version: self.version.clone(),
            commit: self.commit.clone(),
        }
    }

    /// True when the entry carries enough information to traverse into its
    /// source repository.
    #[must_use]
    pub fn has_source_info(&self) -> bool {
        !self.repo_uri.is_empty() && !self.commit.is_empty()
    }
}

impl fmt::Display for DependencyDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Loose identity of a dependency, ignoring its proclaimed source repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LooseDependencyKey {
    /// Dependency name, lowercased.
    pub name: String,
    /// Dependency version.
    pub version: String,
    /// Source commit.
    pub commit: String,
}

/// Normalize a repository URI (or branch name) for use as a lookup key.
///
/// Repository comparison is case-insensitive everywhere in the engine.
pub(crate) fn normalize_key(s: &str) -> String {
    s.to_lowercase()
}

/// Cache key identifying one (repository, commit) pair.
pub(crate) fn repo_commit_key(repo_uri: &str, commit: &str) -> String {
    format!("{}@{}", normalize_key(repo_uri), commit)
}
