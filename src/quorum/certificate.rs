//! Attestation accumulation for a single message.

use super::{threshold, Error, Includers};
use crate::types::{Attestation, Message};
use commonware_cryptography::{Digest, PublicKey};

/// The attestations collected for one broadcast message.
///
/// Completion is edge-triggered: once the accumulated stake reaches the
/// quorum threshold, further attestations are still appended (preserving
/// attestation density for downstream proofs) but no longer change any
/// observable state outside the attestation list itself.
#[derive(Clone, Debug)]
pub struct Certificate<P: PublicKey, D: Digest> {
    message: Message<P, D>,
    attestations: Vec<Attestation<P>>,
    stake: i64,
    completed: bool,
}

impl<P: PublicKey, D: Digest> Certificate<P, D> {
    pub(super) fn new(message: Message<P, D>) -> Self {
        Self {
            message,
            attestations: Vec::new(),
            stake: 0,
            completed: false,
        }
    }

    /// The message this certificate attests to.
    pub fn message(&self) -> &Message<P, D> {
        &self.message
    }

    /// The attestations collected so far.
    pub fn attestations(&self) -> &[Attestation<P>] {
        &self.attestations
    }

    /// The cumulative stake of all attesters.
    pub fn stake(&self) -> i64 {
        self.stake
    }

    /// Whether the accumulated stake has reached the quorum threshold.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Append an attestation, whose signature the caller has already
    /// verified.
    ///
    /// Returns whether this attestation completed the certificate. An
    /// attestation arriving after completion is appended but reports
    /// `false`.
    pub(super) fn add(
        &mut self,
        attestation: Attestation<P>,
        includers: &Includers<P>,
    ) -> Result<bool, Error> {
        let Some(includer) = includers.get(&attestation.signer) else {
            return Err(Error::NotAnIncluder);
        };
        if self
            .attestations
            .iter()
            .any(|existing| existing.signer == attestation.signer)
        {
            return Err(Error::DuplicateAttestation);
        }

        self.attestations.push(attestation);
        self.stake = super::includers::add_stake(self.stake, includer.stake);
        if self.completed {
            return Ok(false);
        }
        self.completed = self.stake >= threshold(includers.total_stake());
        Ok(self.completed)
    }
}
