//! Reliable broadcast of one message per participant per round.
//!
//! # Overview
//!
//! The core of the module is the [`Engine`]. Each round, the application
//! asks it (through the [`Mailbox`], which implements
//! [`Broadcaster`](crate::Broadcaster)) to broadcast one message. The engine
//! publishes the message as data gossip, collects the data gossips of other
//! participants, attests to every message that passes hash and application
//! verification, and accumulates everyone's attestations into the round's
//! quorum certificate. The broadcast resolves with the round's certificate
//! list once a stake-weighted quorum of certificates has completed.
//!
//! # Details
//!
//! All quorum state of a round is owned by a single-task state machine
//! (`round`), so gossip arriving concurrently is applied in a deterministic
//! order. A `manager` drives round lifecycles: at most one round is active
//! per node, starting round `R+1` stops round `R` after draining the
//! operations it already accepted, and rounds at or below the latest one can
//! never be (re)started.
//!
//! Attestations can outrun the data they attest to; handlers park on the
//! certificate subscription until the data arrives, bounded by
//! [`Config::fetch_timeout`]. Handler tasks themselves are bounded by
//! [`Config::handler_limit`]: beyond the cap, the oldest handler is aborted.

mod config;
pub use config::Config;
mod engine;
pub use engine::Engine;
mod ingress;
pub use ingress::Mailbox;
mod manager;
mod metrics;
mod round;
pub mod wire;

use thiserror::Error as ThisError;

/// Errors returned by engine operations.
#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested round is at or below the latest round of this node.
    #[error("elapsed round: {0}")]
    ElapsedRound(u64),
    /// The round was stopped before the operation completed.
    #[error("round closed")]
    RoundClosed,
    /// The engine was shut down.
    #[error("engine closed")]
    EngineClosed,
    /// A subscription did not resolve within the configured timeout.
    #[error("timed out")]
    Timeout,
    /// An identifier failed validation.
    #[error("invalid message id: {0}")]
    InvalidId(#[from] crate::types::Error),
    /// A quorum operation was rejected.
    #[error("quorum: {0}")]
    Quorum(#[from] crate::quorum::Error),
}
