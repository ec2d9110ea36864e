//! Domain types for dependency flow.
//!
//! These are the already-deserialized value types the graph engine consumes:
//! declared dependencies, registry builds and their assets, channels,
//! default-channel mappings, subscriptions and diff descriptors. The engine
//! owns no wire format; collaborators produce these types.

mod build;
mod dependency;
mod diff;
mod subscription;

pub(crate) use dependency::{normalize_key, repo_commit_key};

pub use build::{Asset, Build, BuildTime, Channel};
pub use dependency::{DependencyDetail, DependencyKind, LooseDependencyKey};
pub use diff::GitDiff;
pub use subscription::{DefaultChannel, Subscription, UpdateFrequency};
