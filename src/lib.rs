//! Certify an ever-growing DAG of blocks with stake-weighted reliable broadcast.
//!
//! # Overview
//!
//! At every round, each participant proposes one block and collects a
//! stake-weighted quorum of attestations over every proposed block. Certified
//! blocks reference the certified blocks of the previous round as parents,
//! yielding a DAG that downstream consensus can order (ordering is out of
//! scope here).
//!
//! The crate is organized around three subsystems:
//!
//! - [`quorum`]: the stake accounting data model. A [`quorum::Includers`]
//!   set weighs participants, a [`quorum::Certificate`] accumulates
//!   attestations for one message, and a [`quorum::Quorum`] tracks all
//!   certificates for one round and reports finalization.
//! - [`engine`]: the reliable-broadcast engine. A per-round state machine
//!   serializes all quorum mutations through a single task, a round manager
//!   drives lifecycles across consecutive rounds, and the engine actor
//!   publishes data, attests to verified messages, and resolves broadcasts
//!   once a quorum finalizes.
//! - [`dag`]: the chain driver. An endless loop that assembles one block per
//!   round from a [`pool::Pool`] of batches and the previous round's
//!   certificates, then hands it to a [`Broadcaster`].
//!
//! Networking, membership, and batch dissemination are seams: the engine
//! speaks [`commonware_p2p`] `Sender`/`Receiver` pairs, membership is
//! resolved per-round through [`Membership`], and certified output is
//! delivered through [`Reporter`].

use commonware_cryptography::{Digest, PublicKey};
use std::future::Future;

pub mod dag;
pub mod engine;
pub mod pool;
pub mod quorum;
pub mod types;

#[cfg(test)]
pub mod mocks;

use quorum::{Certificate, Includers};
use types::Message;

/// Reliably broadcasts one message per round and resolves with the round's
/// certificate list once a stake-weighted quorum of them has completed.
pub trait Broadcaster: Clone + Send + 'static {
    /// Identity of a participant.
    type PublicKey: PublicKey;

    /// Digest used by message identifiers.
    type Digest: Digest;

    /// Broadcast a message to all participants of its round.
    ///
    /// Fails with [`engine::Error::ElapsedRound`] if the round is not ahead
    /// of every previously broadcast round.
    fn broadcast(
        &mut self,
        message: Message<Self::PublicKey, Self::Digest>,
        includers: Includers<Self::PublicKey>,
    ) -> impl Future<
        Output = Result<Vec<Certificate<Self::PublicKey, Self::Digest>>, engine::Error>,
    > + Send;
}

/// Application-specific stateful verification of a delivered message.
///
/// Invoked by the engine after the message hash has been checked against its
/// identifier. A message that fails verification is never attested to and
/// its tentative certificate is removed.
pub trait Verifier: Clone + Send + 'static {
    /// Identity of a participant.
    type PublicKey: PublicKey;

    /// Digest used by message identifiers.
    type Digest: Digest;

    /// Verify a message, returning whether it should be attested to.
    fn verify(
        &mut self,
        message: Message<Self::PublicKey, Self::Digest>,
    ) -> impl Future<Output = bool> + Send;
}

/// Provides the includer set for a given round.
///
/// The core caches nothing; the chain driver resolves membership once per
/// round.
pub trait Membership: Clone + Send + Sync + 'static {
    /// Identity of a participant.
    type PublicKey: PublicKey;

    /// Return the includers for the given round, if known.
    fn includers(&self, round: u64) -> Option<Includers<Self::PublicKey>>;
}

/// Consumes the certificate list of every finalized round.
///
/// This is the seam to whatever orders the DAG downstream.
pub trait Reporter: Clone + Send + 'static {
    /// Identity of a participant.
    type PublicKey: PublicKey;

    /// Digest used by message identifiers.
    type Digest: Digest;

    /// Deliver the certificates of a finalized round.
    fn report(
        &mut self,
        round: u64,
        certificates: Vec<Certificate<Self::PublicKey, Self::Digest>>,
    ) -> impl Future<Output = ()> + Send;
}
