//! Commit-diff descriptors attached to graph nodes.

use serde::{Deserialize, Serialize};

/// Result of comparing one commit against a reference commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitDiff {
    /// Reference commit the node was compared against, when known.
    pub base_commit: Option<String>,

    /// The node's own commit, when known.
    pub target_commit: Option<String>,

    /// Commits the base is ahead of the target by.
    pub ahead: u32,

    /// Commits the base is behind the target by.
    pub behind: u32,

    /// False when the diff could not be computed.
    pub valid: bool,
}

impl GitDiff {
    /// A diff of a commit against itself.
    #[must_use]
    pub fn no_diff(commit: &str) -> Self {
        GitDiff {
            base_commit: Some(commit.to_string()),
            target_commit: Some(commit.to_string()),
            ahead: 0,
            behind: 0,
            valid: true,
        }
    }

    /// A diff that could not be determined.
    #[must_use]
    pub fn unknown() -> Self {
        GitDiff {
            base_commit: None,
            target_commit: None,
            ahead: 0,
            behind: 0,
            valid: false,
        }
    }
}
