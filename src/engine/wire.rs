//! Gossip wire format.

use crate::types::{Attestation, MessageId};
use bytes::{Buf, BufMut, Bytes};
use commonware_codec::{
    util::at_least,
    varint::UInt,
    EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, Write,
};
use commonware_cryptography::{Digest, PublicKey};

/// One gossip envelope.
///
/// The data form carries the full payload; the attestation form carries a
/// signature over the canonical identifier (whose producer need not be the
/// identifier's signer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gossip<P: PublicKey, D: Digest> {
    /// A proposed message.
    Data {
        id: MessageId<P, D>,
        data: Bytes,
    },

    /// An attestation over a proposed message.
    Attestation {
        id: MessageId<P, D>,
        attestation: Attestation<P>,
    },
}

impl<P: PublicKey, D: Digest> Write for Gossip<P, D> {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Gossip::Data { id, data } => {
                buf.put_u8(0);
                id.write(buf);
                UInt(data.len() as u64).write(buf);
                buf.put_slice(data);
            }
            Gossip::Attestation { id, attestation } => {
                buf.put_u8(1);
                id.write(buf);
                attestation.write(buf);
            }
        }
    }
}

impl<P: PublicKey, D: Digest> EncodeSize for Gossip<P, D> {
    fn encode_size(&self) -> usize {
        match self {
            Gossip::Data { data, .. } => {
                1 + MessageId::<P, D>::SIZE
                    + UInt(data.len() as u64).encode_size()
                    + data.len()
            }
            Gossip::Attestation { .. } => {
                1 + MessageId::<P, D>::SIZE + Attestation::<P>::SIZE
            }
        }
    }
}

impl<P: PublicKey, D: Digest> Read for Gossip<P, D> {
    /// The maximum accepted payload length.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max_data_size: &Self::Cfg) -> Result<Self, CodecError> {
        at_least(buf, 1)?;
        match buf.get_u8() {
            0 => {
                let id = MessageId::read(buf)?;
                let len: u64 = UInt::<u64>::read(buf)?.into();
                let len = usize::try_from(len).map_err(|_| CodecError::InvalidLength(usize::MAX))?;
                if len > *max_data_size {
                    return Err(CodecError::InvalidLength(len));
                }
                at_least(buf, len)?;
                let data = buf.copy_to_bytes(len);
                Ok(Gossip::Data { id, data })
            }
            1 => {
                let id = MessageId::read(buf)?;
                let attestation = Attestation::read(buf)?;
                Ok(Gossip::Attestation { id, attestation })
            }
            _ => Err(CodecError::Invalid("Gossip", "unknown variant")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{Decode, Encode};
    use commonware_cryptography::{
        ed25519::{PrivateKey, PublicKey},
        sha256, Hasher as _, PrivateKeyExt, Sha256, Signer,
    };

    type TestGossip = Gossip<PublicKey, sha256::Digest>;

    fn id(round: u64, data: &[u8]) -> MessageId<PublicKey, sha256::Digest> {
        MessageId::new(round, PrivateKey::from_seed(0).public_key(), Sha256::hash(data))
    }

    #[test]
    fn test_data_round_trip() {
        let data = Bytes::from_static(b"some block bytes");
        let gossip = TestGossip::Data {
            id: id(1, &data),
            data: data.clone(),
        };
        let encoded = gossip.encode();
        assert_eq!(encoded.len(), gossip.encode_size());
        let decoded = TestGossip::decode_cfg(encoded, &1024).unwrap();
        assert_eq!(gossip, decoded);
    }

    #[test]
    fn test_attestation_round_trip() {
        let crypto = PrivateKey::from_seed(3);
        let id = id(7, b"payload");
        let gossip = TestGossip::Attestation {
            id: id.clone(),
            attestation: Attestation::sign(&crypto, b"_WIRE_TEST", &id),
        };
        let decoded = TestGossip::decode_cfg(gossip.encode(), &1024).unwrap();
        assert_eq!(gossip, decoded);
    }

    #[test]
    fn test_rejects_oversized_data() {
        let data = Bytes::from(vec![7u8; 64]);
        let gossip = TestGossip::Data {
            id: id(1, &data),
            data,
        };
        assert!(matches!(
            TestGossip::decode_cfg(gossip.encode(), &63),
            Err(CodecError::InvalidLength(64))
        ));
    }

    #[test]
    fn test_rejects_unknown_variant() {
        assert!(matches!(
            TestGossip::decode_cfg(Bytes::from_static(&[2u8]), &1024),
            Err(CodecError::Invalid("Gossip", "unknown variant"))
        ));
    }
}
