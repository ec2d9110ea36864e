//! Error types for depflow graph operations.

use std::io;
use thiserror::Error;

/// The error type for depflow graph operations.
///
/// The variants fall into three buckets with different handling rules:
///
/// - `Config` is raised synchronously before a traversal starts and is always
///   fatal to the call.
/// - `DependencyFileNotFound` and `AppNotInstalled` are per-node data
///   conditions reported by collaborators. The graph builder recovers from
///   them locally (the node becomes a leaf) and they never escape a build.
/// - `Remote`, `Io` and `Cancelled` are infrastructure failures; they abort
///   the whole build and callers never receive a partially-built graph.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid combination of build options or inputs, detected before traversal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dependency manifest does not exist at the requested commit.
    ///
    /// Repositories may legitimately pin commits that pre-date the manifest,
    /// so the graph builder treats this as "no dependency information".
    #[error("Dependency manifest not found in {repo} at {commit}")]
    DependencyFileNotFound {
        /// Repository URI that was queried.
        repo: String,
        /// Commit that was queried.
        commit: String,
    },

    /// The remote application is not installed for the repository's organization.
    ///
    /// Treated like a missing manifest: no dependency information available.
    #[error("Application not installed for {repo}")]
    AppNotInstalled {
        /// Repository URI that was queried.
        repo: String,
    },

    /// Unexpected failure from a remote collaborator (repository or registry).
    #[error("Remote error: {0}")]
    Remote(String),

    /// A dependency manifest exists but could not be parsed.
    #[error("Malformed dependency manifest: {0}")]
    MalformedManifest(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The caller requested cancellation; no partial graph is returned.
    #[error("Graph build was cancelled")]
    Cancelled,
}

impl Error {
    /// True for the per-node data conditions the graph builder recovers from
    /// by treating the node as a leaf.
    #[must_use]
    pub fn is_missing_dependency_info(&self) -> bool {
        matches!(
            self,
            Error::DependencyFileNotFound { .. } | Error::AppNotInstalled { .. }
        )
    }
}

/// A specialized Result type for depflow operations.
pub type Result<T> = std::result::Result<T, Error>;
