//! Registry-side build and channel types.

use crate::models::DependencyDetail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named grouping that builds can be associated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    /// Registry identifier of the channel.
    pub id: i32,

    /// Channel name, e.g. ".NET 9 Preview".
    pub name: String,
}

/// An asset produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Asset name.
    pub name: String,

    /// Asset version.
    pub version: String,
}

impl Asset {
    /// True when this asset satisfies the given dependency entry.
    ///
    /// Asset names compare case-insensitively; versions compare exactly.
    #[must_use]
    pub fn matches_dependency(&self, dependency: &DependencyDetail) -> bool {
        self.name.eq_ignore_ascii_case(&dependency.name) && self.version == dependency.version
    }
}

/// A build recorded by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Registry identifier of the build.
    pub id: i32,

    /// Repository the build was produced from.
    pub repository: String,

    /// Commit the build was produced from.
    pub commit: String,

    /// When the build was produced.
    pub date_produced: DateTime<Utc>,

    /// Channels the build is currently associated with.
    pub channels: Vec<Channel>,

    /// Assets the build produced.
    pub assets: Vec<Asset>,
}

impl Build {
    /// True when the build produced an asset satisfying the dependency entry.
    #[must_use]
    pub fn produced(&self, dependency: &DependencyDetail) -> bool {
        self.assets.iter().any(|a| a.matches_dependency(dependency))
    }
}

/// Aggregate build-time statistics for a (repository, branch) pair over a
/// lookback window, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildTime {
    /// Average official (CI) build duration.
    pub official_minutes: f64,

    /// Average pull-request build duration.
    pub pr_minutes: f64,

    /// Goal time configured for the build definition.
    pub goal_minutes: f64,
}
