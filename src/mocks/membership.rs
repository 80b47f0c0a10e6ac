use crate::quorum::{Includer, Includers};
use commonware_cryptography::PublicKey;
use std::sync::Arc;

/// A static membership: the same includer set for every round.
pub struct Membership<P: PublicKey> {
    includers: Arc<Vec<Includer<P>>>,
}

impl<P: PublicKey> Clone for Membership<P> {
    fn clone(&self) -> Self {
        Self {
            includers: self.includers.clone(),
        }
    }
}

impl<P: PublicKey> Membership<P> {
    pub fn new(includers: Vec<Includer<P>>) -> Self {
        Self {
            includers: Arc::new(includers),
        }
    }

    /// A membership of the given keys, all at unit stake.
    pub fn uniform(keys: impl IntoIterator<Item = P>) -> Self {
        Self::new(
            keys.into_iter()
                .map(|public_key| Includer::new(public_key, 1))
                .collect(),
        )
    }
}

impl<P: PublicKey> crate::Membership for Membership<P> {
    type PublicKey = P;

    fn includers(&self, _: u64) -> Option<Includers<P>> {
        Some(Includers::new(self.includers.as_ref().clone()))
    }
}
