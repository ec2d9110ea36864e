//! depflow - dependency flow analysis for multi-repository products.
//!
//! Two graph models over a family of repositories that ship each other's
//! build outputs:
//!
//! - [`graph`]: the commit-level dependency graph. Starting from one
//!   (repository, commit), follow every declared dependency's source
//!   back to the commit that produced it, transitively, and report
//!   version incoherencies, cycles and the registry builds each node
//!   came from.
//! - [`flow`]: the channel-level flow graph. Nodes are (repository,
//!   branch) pairs, edges are the subscriptions moving builds between
//!   them, and the analyses on top answer questions like "which edge
//!   closes a cycle" and "how long until a fix here reaches the
//!   product".
//!
//! The engine talks to the outside world only through the traits in
//! [`remote`]; [`local`] implements the repository side against clones
//! on disk for offline use.

#![forbid(unsafe_code)]

pub mod error;
pub mod flow;
pub mod graph;
pub mod local;
pub mod models;
pub mod remote;

pub use error::{Error, Result};
