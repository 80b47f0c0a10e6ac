//! Application verification of delivered blocks.

use super::block::{Block, Limits};
use crate::{
    pool::{Error as PoolError, Pool},
    types::Message,
};
use commonware_codec::Decode;
use tracing::debug;

/// Verifies that a delivered message is a well-formed block whose referenced
/// batches are available in the local pool.
///
/// Pulls park until the referenced batch arrives from its producer, so
/// verification also absorbs block gossip outrunning batch dissemination. A
/// batch deleted while a pull is parked is treated as success: the deletion
/// means it was already committed, and re-fetching it is not required for
/// attestation.
pub struct Verifier<B: Pool> {
    pool: B,
    limits: Limits,
}

impl<B: Pool> Clone for Verifier<B> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            limits: self.limits,
        }
    }
}

impl<B: Pool> Verifier<B> {
    /// Create a verifier over the given pool.
    pub fn new(pool: B, limits: Limits) -> Self {
        Self { pool, limits }
    }
}

impl<B: Pool> crate::Verifier for Verifier<B> {
    type PublicKey = B::PublicKey;
    type Digest = B::Digest;

    async fn verify(&mut self, message: Message<B::PublicKey, B::Digest>) -> bool {
        if message.data.is_empty() {
            return false;
        }
        if message.id.validate().is_err() {
            return false;
        }
        let block = match Block::<B::PublicKey, B::Digest>::decode_cfg(
            message.data.clone(),
            &self.limits,
        ) {
            Ok(block) => block,
            Err(err) => {
                debug!(?err, id = %message.id, "block decode failed");
                return false;
            }
        };

        // The identifier's hash covers the encoded block, but its round and
        // signer are independent fields; a block is only valid if they
        // agree.
        if block.round() != message.id.round() || block.signer() != message.id.signer() {
            return false;
        }

        for digest in block.batches() {
            match self.pool.pull(*digest).await {
                Ok(_) => {}
                // Deleted after inclusion elsewhere; racing the garbage
                // collector is not a verification failure.
                Err(PoolError::BatchDeleted) => {}
            }
        }
        true
    }
}
