//! Pooling of transaction batches between production and block inclusion.
//!
//! The chain driver consumes the pool from two directions: it lists this
//! node's own uncommitted batches when assembling a block, and the block
//! verifier pulls every batch referenced by a delivered block (parking until
//! the batch arrives from its producer). Batches that are never included are
//! evicted by a background garbage collector after a staleness window;
//! parked pulls for an evicted batch are released with
//! [`Error::BatchDeleted`].
//!
//! How batches travel between nodes is an implementation concern of the
//! pool (e.g. point-to-point multicast); the core only consumes this
//! interface.

use bytes::Bytes;
use commonware_cryptography::{Digest, Hasher, PublicKey};
use std::future::Future;
use thiserror::Error;

mod mem;
pub use mem::{Config, Mem};

/// Errors returned by pool operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The batch was deleted (included elsewhere or evicted by the garbage
    /// collector) while the operation was in flight.
    #[error("batch deleted")]
    BatchDeleted,
}

/// A batch of opaque transaction data produced by one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch<P: PublicKey, D: Digest> {
    /// The participant that produced the batch.
    pub signer: P,

    /// Opaque batch contents.
    pub data: Bytes,

    digest: D,
}

impl<P: PublicKey, D: Digest> Batch<P, D> {
    /// Create a batch, computing its digest with `H`.
    pub fn new<H: Hasher<Digest = D>>(signer: P, data: Bytes) -> Self {
        let digest = H::hash(&data);
        Self {
            signer,
            data,
            digest,
        }
    }

    /// The digest of the batch contents.
    pub fn digest(&self) -> D {
        self.digest
    }
}

/// A shared pool of batches.
pub trait Pool: Clone + Send + Sync + 'static {
    /// Identity of a participant.
    type PublicKey: PublicKey;

    /// Digest used for batch contents.
    type Digest: Digest;

    /// Add a batch to the pool.
    fn push(
        &mut self,
        batch: Batch<Self::PublicKey, Self::Digest>,
    ) -> impl Future<Output = ()> + Send;

    /// Fetch the batch with the given digest, parking until it exists.
    ///
    /// Fails with [`Error::BatchDeleted`] if the batch is deleted while
    /// parked.
    fn pull(
        &mut self,
        digest: Self::Digest,
    ) -> impl Future<Output = Result<Batch<Self::PublicKey, Self::Digest>, Error>> + Send;

    /// List the batches produced by `signer`, parking until at least one
    /// exists.
    fn list_by_signer(
        &mut self,
        signer: Self::PublicKey,
    ) -> impl Future<Output = Vec<Batch<Self::PublicKey, Self::Digest>>> + Send;

    /// Remove a batch after its inclusion in a certified block.
    fn delete(&mut self, digest: &Self::Digest) -> impl Future<Output = ()> + Send;

    /// The number of pooled batches.
    fn size(&mut self) -> impl Future<Output = usize> + Send;
}
