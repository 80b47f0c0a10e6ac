use crate::types::Message;
use commonware_cryptography::{Digest, PublicKey};
use std::{collections::HashSet, marker::PhantomData, sync::Arc};

/// A verifier that accepts everything except messages signed by a
/// configured set of proposers.
pub struct Verifier<P: PublicKey, D: Digest> {
    rejected: Arc<HashSet<P>>,
    _digest: PhantomData<D>,
}

impl<P: PublicKey, D: Digest> Clone for Verifier<P, D> {
    fn clone(&self) -> Self {
        Self {
            rejected: self.rejected.clone(),
            _digest: PhantomData,
        }
    }
}

impl<P: PublicKey, D: Digest> Verifier<P, D> {
    /// Accept every message.
    pub fn accepting() -> Self {
        Self::rejecting([])
    }

    /// Reject messages proposed by the given signers.
    pub fn rejecting(signers: impl IntoIterator<Item = P>) -> Self {
        Self {
            rejected: Arc::new(signers.into_iter().collect()),
            _digest: PhantomData,
        }
    }
}

impl<P: PublicKey, D: Digest> crate::Verifier for Verifier<P, D> {
    type PublicKey = P;
    type Digest = D;

    async fn verify(&mut self, message: Message<P, D>) -> bool {
        !self.rejected.contains(message.id.signer())
    }
}
