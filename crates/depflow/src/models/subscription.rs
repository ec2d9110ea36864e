//! Default-channel mappings and subscriptions: the inputs of the flow graph.

use crate::models::Channel;
use serde::{Deserialize, Serialize};

/// How often a subscription applies updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateFrequency {
    /// Apply on every source build.
    EveryBuild,
    /// Apply once a day.
    EveryDay,
    /// Apply twice a day.
    TwiceDaily,
    /// Apply once a week.
    EveryWeek,
    /// On-demand only.
    None,
}

impl UpdateFrequency {
    /// Canonical name used when filtering by requested frequencies.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateFrequency::EveryBuild => "everyBuild",
            UpdateFrequency::EveryDay => "everyDay",
            UpdateFrequency::TwiceDaily => "twiceDaily",
            UpdateFrequency::EveryWeek => "everyWeek",
            UpdateFrequency::None => "none",
        }
    }
}

/// A persistent mapping stating that builds of a (repository, branch) pair
/// are, by default, associated with a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultChannel {
    /// Registry identifier. Zero means the mapping has no recorded identity
    /// (e.g. a synthetic entry) and no build-time statistics exist for it.
    pub id: i32,

    /// Repository whose builds are mapped.
    pub repository: String,

    /// Branch whose builds are mapped.
    pub branch: String,

    /// Channel the builds are associated with.
    pub channel: Channel,

    /// Whether the mapping is active.
    pub enabled: bool,
}

/// A rule stating that a target repository/branch wants dependency updates
/// sourced from builds of a given channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Registry identifier of the subscription.
    pub id: String,

    /// Whether the subscription is active.
    pub enabled: bool,

    /// Repository the updates are sourced from.
    pub source_repository: String,

    /// Repository receiving the updates.
    pub target_repository: String,

    /// Branch receiving the updates.
    pub target_branch: String,

    /// Channel the updates are sourced from.
    pub channel: Channel,

    /// How often updates are applied.
    pub update_frequency: UpdateFrequency,
}
