//! Endless production of certified blocks.

use super::{
    block::{Block, Limits},
    Error,
};
use crate::{pool::Pool, quorum::Certificate, types::Message, Broadcaster, Membership, Reporter};
use commonware_codec::{Decode, Encode};
use commonware_cryptography::{Hasher, Signer};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use std::{marker::PhantomData, time::Duration};
use tracing::{debug, info, warn};

/// Configuration for the [`Chain`].
pub struct Config<C, B, M, Z, R> {
    /// The signing scheme of this participant.
    pub crypto: C,

    /// The pool of batches to commit.
    pub pool: B,

    /// Resolves the includer set of each round.
    pub membership: M,

    /// Broadcasts one block per round.
    pub broadcaster: Z,

    /// Consumes the certificates of every finalized round.
    pub reporter: R,

    /// Optional delay honoured before starting each round (bounds round
    /// frequency for experimentation).
    pub pacing: Option<Duration>,

    /// How long to back off after a failed round before retrying at the
    /// same height.
    pub retry: Duration,

    /// Bounds applied when decoding certified blocks.
    pub limits: Limits,
}

/// Produces an everlasting DAG of blocks by broadcasting one block per round
/// over reliable broadcast.
pub struct Chain<
    E: Clock + Spawner + Metrics,
    C: Signer,
    H: Hasher,
    B: Pool<PublicKey = C::PublicKey, Digest = H::Digest>,
    M: Membership<PublicKey = C::PublicKey>,
    Z: Broadcaster<PublicKey = C::PublicKey, Digest = H::Digest>,
    R: Reporter<PublicKey = C::PublicKey, Digest = H::Digest>,
> {
    context: E,
    crypto: C,
    pool: B,
    membership: M,
    broadcaster: Z,
    reporter: R,
    pacing: Option<Duration>,
    retry: Duration,
    limits: Limits,

    /// The round being produced. Rounds are numbered from one.
    height: u64,

    /// The certificates of the previous round.
    last: Vec<Certificate<C::PublicKey, H::Digest>>,

    _hasher: PhantomData<H>,
}

impl<
        E: Clock + Spawner + Metrics,
        C: Signer,
        H: Hasher,
        B: Pool<PublicKey = C::PublicKey, Digest = H::Digest>,
        M: Membership<PublicKey = C::PublicKey>,
        Z: Broadcaster<PublicKey = C::PublicKey, Digest = H::Digest>,
        R: Reporter<PublicKey = C::PublicKey, Digest = H::Digest>,
    > Chain<E, C, H, B, M, Z, R>
{
    /// Creates a new chain with the given context and configuration.
    pub fn new(context: E, cfg: Config<C, B, M, Z, R>) -> Self {
        Self {
            context,
            crypto: cfg.crypto,
            pool: cfg.pool,
            membership: cfg.membership,
            broadcaster: cfg.broadcaster,
            reporter: cfg.reporter,
            pacing: cfg.pacing,
            retry: cfg.retry,
            limits: cfg.limits,
            height: 1,
            last: Vec::new(),
            _hasher: PhantomData,
        }
    }

    /// Starts the chain.
    pub fn start(mut self) -> Handle<()> {
        self.context.clone().spawn(move |_| self.run())
    }

    /// Inner run loop called by `start`: produce a block per round, backing
    /// off on failure without advancing the height.
    async fn run(mut self) {
        let mut shutdown = self.context.stopped();
        debug!("chain started");
        loop {
            if let Some(pacing) = self.pacing {
                select! {
                    _ = &mut shutdown => { return; },
                    _pacing = self.context.sleep(pacing) => {},
                };
            }
            let result = select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    return;
                },
                result = self.step() => { result },
            };
            if let Err(err) = result {
                warn!(?err, height = self.height, "round failed");
                select! {
                    _ = &mut shutdown => { return; },
                    _retry = self.context.sleep(self.retry) => {},
                };
            }
        }
    }

    /// Assemble and broadcast the block for the current height.
    ///
    /// Stages:
    /// - collect the hashes of the previous round's certified blocks as
    ///   parents, releasing the batches they committed
    /// - gather this node's uncommitted batches (parking until one exists)
    /// - broadcast the block and wait until the round's quorum finalizes
    async fn step(&mut self) -> Result<(), Error> {
        let mut parents = Vec::with_capacity(self.last.len());
        for certificate in &self.last {
            let message = certificate.message();
            // Locally certified blocks were verified before attestation, so
            // a decode failure here is a protocol invariant violation.
            let block = Block::<C::PublicKey, H::Digest>::decode_cfg(
                message.data.clone(),
                &self.limits,
            )
            .expect("certified block failed to decode");
            for digest in block.batches() {
                self.pool.delete(digest).await;
            }
            parents.push(message.id.hash());
        }

        let batches = self.pool.list_by_signer(self.crypto.public_key()).await;
        let digests = batches.iter().map(|batch| batch.digest()).collect();
        let block = Block::new(self.height, self.crypto.public_key(), digests, parents);
        let message = Message {
            id: block.id::<H>(),
            data: block.encode().into(),
        };

        let includers = self
            .membership
            .includers(self.height)
            .ok_or(Error::UnknownIncluders(self.height))?;
        let started = self.context.current();
        let certificates = self.broadcaster.broadcast(message, includers).await?;
        let elapsed = self
            .context
            .current()
            .duration_since(started)
            .unwrap_or_default();
        info!(
            height = self.height,
            batches = batches.len(),
            parents = block.parents().len(),
            certificates = certificates.len(),
            ?elapsed,
            "round finalized"
        );

        self.reporter.report(self.height, certificates.clone()).await;
        self.last = certificates;
        self.height += 1;
        Ok(())
    }
}
