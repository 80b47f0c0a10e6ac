//! Block payload carried by broadcast messages.

use crate::types::MessageId;
use bytes::{Buf, BufMut};
use commonware_codec::{
    util::at_least,
    varint::UInt,
    Encode, EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, Write,
};
use commonware_cryptography::{Digest, Hasher, PublicKey};

/// Bounds applied when decoding a block from untrusted bytes.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// The maximum number of batch digests per block.
    pub max_batches: usize,

    /// The maximum number of parent digests per block.
    pub max_parents: usize,
}

/// One vertex of the DAG: the batches a participant gathered this round and
/// the certified blocks of the previous round it builds on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block<P: PublicKey, D: Digest> {
    round: u64,
    signer: P,
    batches: Vec<D>,
    parents: Vec<D>,
}

impl<P: PublicKey, D: Digest> Block<P, D> {
    /// Assemble a block.
    pub fn new(round: u64, signer: P, batches: Vec<D>, parents: Vec<D>) -> Self {
        Self {
            round,
            signer,
            batches,
            parents,
        }
    }

    /// The round the block belongs to.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// The participant that proposed the block.
    pub fn signer(&self) -> &P {
        &self.signer
    }

    /// Digests of the batches committed by this block.
    pub fn batches(&self) -> &[D] {
        &self.batches
    }

    /// Digests of the certified blocks of the previous round.
    pub fn parents(&self) -> &[D] {
        &self.parents
    }

    /// The digest of the canonical encoding.
    pub fn digest<H: Hasher<Digest = D>>(&self) -> D {
        H::hash(self.encode().as_ref())
    }

    /// The broadcast identifier of the block.
    pub fn id<H: Hasher<Digest = D>>(&self) -> MessageId<P, D> {
        MessageId::new(self.round, self.signer.clone(), self.digest::<H>())
    }
}

impl<P: PublicKey, D: Digest> Write for Block<P, D> {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.round);
        self.signer.write(buf);
        UInt(self.batches.len() as u64).write(buf);
        for digest in &self.batches {
            digest.write(buf);
        }
        UInt(self.parents.len() as u64).write(buf);
        for digest in &self.parents {
            digest.write(buf);
        }
    }
}

impl<P: PublicKey, D: Digest> EncodeSize for Block<P, D> {
    fn encode_size(&self) -> usize {
        u64::SIZE
            + P::SIZE
            + UInt(self.batches.len() as u64).encode_size()
            + self.batches.len() * D::SIZE
            + UInt(self.parents.len() as u64).encode_size()
            + self.parents.len() * D::SIZE
    }
}

fn read_digests<D: Digest>(
    buf: &mut impl Buf,
    max: usize,
) -> Result<Vec<D>, CodecError> {
    let len: u64 = UInt::<u64>::read(buf)?.into();
    let len = usize::try_from(len).map_err(|_| CodecError::InvalidLength(usize::MAX))?;
    if len > max {
        return Err(CodecError::InvalidLength(len));
    }
    let mut digests = Vec::with_capacity(len);
    for _ in 0..len {
        digests.push(D::read(buf)?);
    }
    Ok(digests)
}

impl<P: PublicKey, D: Digest> Read for Block<P, D> {
    type Cfg = Limits;

    fn read_cfg(buf: &mut impl Buf, limits: &Self::Cfg) -> Result<Self, CodecError> {
        at_least(buf, u64::SIZE)?;
        let round = buf.get_u64_le();
        let signer = P::read(buf)?;
        let batches = read_digests(buf, limits.max_batches)?;
        let parents = read_digests(buf, limits.max_parents)?;
        Ok(Self {
            round,
            signer,
            batches,
            parents,
        })
    }
}
