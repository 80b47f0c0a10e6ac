//! Stake-weighted quorum accounting.
//!
//! An [`Includers`] set weighs the participants of one round. A
//! [`Certificate`] accumulates attestations for one message until their
//! cumulative stake reaches the quorum threshold. A [`Quorum`] holds every
//! certificate of a round and finalizes once the proposers of its completed
//! certificates jointly meet the same threshold.
//!
//! Nothing in this module is thread-safe; concurrent access is mediated by
//! the round state machine in [`crate::engine`].

use crate::types::{Attestation, Message, MessageId};
use commonware_cryptography::{Digest, PublicKey};
use std::collections::BTreeMap;
use thiserror::Error;

mod includers;
pub use includers::{Includer, Includers, MAX_STAKE};
mod certificate;
pub use certificate::Certificate;

/// Errors returned by quorum operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("signer is not an includer")]
    NotAnIncluder,
    #[error("duplicate attestation from signer")]
    DuplicateAttestation,
    #[error("certificate exists")]
    CertificateExists,
    #[error("unknown certificate")]
    UnknownCertificate,
    #[error("includer has negative stake")]
    NegativeStake,
    #[error("includer set is empty")]
    EmptyIncluders,
}

/// The stake required for a quorum over a set with cumulative stake
/// `total_stake`: more than two thirds.
pub fn threshold(total_stake: i64) -> i64 {
    2 * total_stake / 3 + 1
}

/// The certificates of one round on one node.
///
/// Append-only until the round is stopped; certificates are only deleted
/// when local verification fails before completion.
#[derive(Debug)]
pub struct Quorum<P: PublicKey, D: Digest> {
    includers: Includers<P>,
    certificates: BTreeMap<MessageId<P, D>, Certificate<P, D>>,
    completed_stake: i64,
}

impl<P: PublicKey, D: Digest> Quorum<P, D> {
    /// Create an empty quorum over the given includers.
    pub fn new(includers: Includers<P>) -> Self {
        Self {
            includers,
            certificates: BTreeMap::new(),
            completed_stake: 0,
        }
    }

    /// The includers of this round.
    pub fn includers(&self) -> &Includers<P> {
        &self.includers
    }

    /// Create an empty certificate for a message.
    ///
    /// Stateful verification (hash consistency, application semantics) is
    /// the caller's responsibility and happens outside this call.
    pub fn add(&mut self, message: Message<P, D>) -> Result<(), Error> {
        if self.includers.get(message.id.signer()).is_none() {
            return Err(Error::NotAnIncluder);
        }
        if self.certificates.contains_key(&message.id) {
            return Err(Error::CertificateExists);
        }
        let id = message.id.clone();
        self.certificates.insert(id, Certificate::new(message));
        Ok(())
    }

    /// Look up a certificate.
    pub fn get(&self, id: &MessageId<P, D>) -> Option<&Certificate<P, D>> {
        self.certificates.get(id)
    }

    /// Remove a certificate.
    pub fn delete(&mut self, id: &MessageId<P, D>) -> Result<(), Error> {
        self.certificates
            .remove(id)
            .map(|_| ())
            .ok_or(Error::UnknownCertificate)
    }

    /// Snapshot all certificates.
    pub fn list(&self) -> Vec<Certificate<P, D>> {
        self.certificates.values().cloned().collect()
    }

    /// Append a pre-verified attestation to the certificate for `id`.
    ///
    /// Returns whether the attestation completed the certificate. On
    /// completion, the stake of the certified message's proposer counts
    /// towards finalization.
    pub fn attest(
        &mut self,
        id: &MessageId<P, D>,
        attestation: Attestation<P>,
    ) -> Result<bool, Error> {
        let certificate = self
            .certificates
            .get_mut(id)
            .ok_or(Error::UnknownCertificate)?;
        let completed = certificate.add(attestation, &self.includers)?;
        if completed {
            let proposer = self
                .includers
                .get(certificate.message().id.signer())
                .expect("certificate proposer must be an includer");
            self.completed_stake =
                includers::add_stake(self.completed_stake, proposer.stake);
        }
        Ok(completed)
    }

    /// Whether the proposers of completed certificates jointly meet the
    /// quorum threshold.
    pub fn finalized(&self) -> bool {
        self.completed_stake >= threshold(self.includers.total_stake())
    }
}
