//! Production of an everlasting DAG of certified blocks.
//!
//! # Overview
//!
//! The [`Chain`] produces one [`Block`] per round: it gathers this node's
//! uncommitted batches from a [`Pool`](crate::pool::Pool), references the
//! certified blocks of the previous round as parents, and hands the block to
//! a [`Broadcaster`](crate::Broadcaster). When the round's quorum finalizes,
//! the certificate list is delivered to a [`Reporter`](crate::Reporter) and
//! the next round begins. The [`Verifier`] is the application side of the
//! same protocol: it admits a delivered block once every batch it references
//! is available locally.

mod block;
pub use block::{Block, Limits};
mod chain;
pub use chain::{Chain, Config};
mod verifier;
pub use verifier::Verifier;

use thiserror::Error as ThisError;

/// Errors returned by the chain driver.
#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum Error {
    /// Membership could not resolve the includers of a round.
    #[error("no includers for round {0}")]
    UnknownIncluders(u64),
    /// The broadcast of a block failed.
    #[error("broadcast: {0}")]
    Broadcast(#[from] crate::engine::Error),
}
