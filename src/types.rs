//! Message identifiers, messages, and attestations.

use bytes::{Buf, BufMut, Bytes};
use commonware_codec::{util::at_least, Encode, Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_cryptography::{Digest, PublicKey, Signer, Verifier as _};
use std::fmt;
use thiserror::Error;

/// Errors returned when validating a [`MessageId`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("round must be non-zero")]
    ZeroRound,
}

/// Uniquely identifies a broadcast message.
///
/// The canonical encoding (round as 8 little-endian bytes, then signer, then
/// hash) is the exact input to the signing function, so two identifiers that
/// encode differently can never share an attestation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId<P: PublicKey, D: Digest> {
    round: u64,
    signer: P,
    hash: D,
}

impl<P: PublicKey, D: Digest> MessageId<P, D> {
    /// Create a new identifier.
    pub fn new(round: u64, signer: P, hash: D) -> Self {
        Self {
            round,
            signer,
            hash,
        }
    }

    /// The round the message belongs to.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// The producer of the message.
    pub fn signer(&self) -> &P {
        &self.signer
    }

    /// The digest of the message data.
    pub fn hash(&self) -> D {
        self.hash
    }

    /// Basic well-formedness. Rounds are numbered from one, so a zero round
    /// can only be the result of a forged or corrupted identifier.
    pub fn validate(&self) -> Result<(), Error> {
        if self.round == 0 {
            return Err(Error::ZeroRound);
        }
        Ok(())
    }
}

impl<P: PublicKey, D: Digest> fmt::Display for MessageId<P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Derived from the hash, so distinct identifiers display distinctly.
        write!(f, "{}", self.hash)
    }
}

impl<P: PublicKey, D: Digest> Write for MessageId<P, D> {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.round);
        self.signer.write(buf);
        self.hash.write(buf);
    }
}

impl<P: PublicKey, D: Digest> FixedSize for MessageId<P, D> {
    const SIZE: usize = u64::SIZE + P::SIZE + D::SIZE;
}

impl<P: PublicKey, D: Digest> Read for MessageId<P, D> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &Self::Cfg) -> Result<Self, CodecError> {
        at_least(buf, u64::SIZE)?;
        let round = buf.get_u64_le();
        let signer = P::read(buf)?;
        let hash = D::read(buf)?;
        Ok(Self {
            round,
            signer,
            hash,
        })
    }
}

/// A message under broadcast: an identifier and opaque data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<P: PublicKey, D: Digest> {
    /// Identifier of the message.
    pub id: MessageId<P, D>,

    /// Opaque payload. The engine only requires that its hash matches
    /// `id.hash()`.
    pub data: Bytes,
}

/// A signature over a canonical [`MessageId`], together with its producer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attestation<P: PublicKey> {
    /// The participant that produced the signature.
    pub signer: P,

    /// The signature over the canonical identifier.
    pub signature: P::Signature,
}

impl<P: PublicKey> Attestation<P> {
    /// Sign the canonical encoding of an identifier.
    pub fn sign<C: Signer<PublicKey = P>, D: Digest>(
        crypto: &C,
        namespace: &[u8],
        id: &MessageId<P, D>,
    ) -> Self {
        let signature = crypto.sign(namespace, id.encode().as_ref());
        Self {
            signer: crypto.public_key(),
            signature,
        }
    }

    /// Verify the signature against the canonical encoding of `id`.
    pub fn verify<D: Digest>(&self, namespace: &[u8], id: &MessageId<P, D>) -> bool {
        self.signer
            .verify(namespace, id.encode().as_ref(), &self.signature)
    }
}

impl<P: PublicKey> Write for Attestation<P> {
    fn write(&self, buf: &mut impl BufMut) {
        self.signer.write(buf);
        self.signature.write(buf);
    }
}

impl<P: PublicKey> FixedSize for Attestation<P> {
    const SIZE: usize = P::SIZE + <P::Signature as FixedSize>::SIZE;
}

impl<P: PublicKey> Read for Attestation<P> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &Self::Cfg) -> Result<Self, CodecError> {
        let signer = P::read(buf)?;
        let signature = P::Signature::read(buf)?;
        Ok(Self { signer, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};
    use commonware_cryptography::{
        ed25519::{PrivateKey, PublicKey},
        sha256, Hasher as _, PrivateKeyExt, Sha256,
    };

    fn id(round: u64, seed: u64, data: &[u8]) -> MessageId<PublicKey, sha256::Digest> {
        let signer = PrivateKey::from_seed(seed).public_key();
        MessageId::new(round, signer, Sha256::hash(data))
    }

    #[test]
    fn test_id_codec_round_trip() {
        let id = id(42, 0, b"payload");
        let encoded = id.encode();
        assert_eq!(encoded.len(), MessageId::<PublicKey, sha256::Digest>::SIZE);
        let decoded = MessageId::<PublicKey, sha256::Digest>::decode(encoded).unwrap();
        assert_eq!(id, decoded);
        assert_eq!(id.round(), decoded.round());
        assert_eq!(id.signer(), decoded.signer());
        assert_eq!(id.hash(), decoded.hash());
    }

    #[test]
    fn test_id_validate() {
        assert!(id(1, 0, b"payload").validate().is_ok());
        assert_eq!(id(0, 0, b"payload").validate(), Err(Error::ZeroRound));
    }

    #[test]
    fn test_id_display_follows_hash() {
        let a = id(1, 0, b"a");
        let b = id(1, 0, b"b");
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), id(2, 1, b"a").to_string());
    }

    #[test]
    fn test_attestation_sign_verify() {
        let namespace = b"_RATIFY";
        let crypto = PrivateKey::from_seed(0);
        let id = id(1, 0, b"payload");
        let attestation = Attestation::sign(&crypto, namespace, &id);
        assert!(attestation.verify(namespace, &id));

        // A different identifier or namespace must not verify.
        let other = MessageId::new(2, crypto.public_key(), Sha256::hash(b"payload"));
        assert!(!attestation.verify(namespace, &other));
        assert!(!attestation.verify(b"_OTHER", &id));
    }

    #[test]
    fn test_attestation_codec_round_trip() {
        let crypto = PrivateKey::from_seed(7);
        let id = id(3, 7, b"payload");
        let attestation = Attestation::sign(&crypto, b"_RATIFY", &id);
        let decoded =
            Attestation::<PublicKey>::decode(attestation.encode()).unwrap();
        assert_eq!(attestation, decoded);
    }
}
