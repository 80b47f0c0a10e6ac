use super::{ingress, manager::Manager, metrics, wire::Gossip, Config, Error, Mailbox};
use crate::{
    quorum::{Includers, Quorum},
    types::{Attestation, Message as Payload, MessageId},
    Verifier,
};
use commonware_codec::{Decode, Encode};
use commonware_cryptography::{Digest, Hasher, PublicKey, Signer};
use commonware_macros::select;
use commonware_p2p::{Receiver, Recipients, Sender};
use commonware_runtime::{Clock, Handle, Metrics as RuntimeMetrics, Spawner};
use futures::{
    channel::{mpsc, oneshot},
    SinkExt, StreamExt,
};
use std::{collections::VecDeque, marker::PhantomData, time::Duration};
use tracing::{debug, error, warn};

/// Instance of the broadcast engine.
///
/// It is responsible for:
/// - Publishing this node's proposal each round
/// - Processing inbound data gossip: hash check, certificate creation,
///   application verification, attestation
/// - Processing inbound attestation gossip: certificate lookup (parking on
///   the data if it has not arrived yet), signature verification,
///   accumulation
/// - Resolving broadcasts once the round's quorum finalizes
pub struct Engine<
    E: Clock + Spawner + RuntimeMetrics,
    C: Signer,
    H: Hasher,
    V: Verifier<PublicKey = C::PublicKey, Digest = H::Digest>,
    NetS: Sender<PublicKey = C::PublicKey>,
    NetR: Receiver<PublicKey = C::PublicKey>,
> {
    ////////////////////////////////////////
    // Interfaces
    ////////////////////////////////////////
    context: E,
    crypto: C,
    verifier: V,
    _sender: PhantomData<NetS>,
    _receiver: PhantomData<NetR>,

    ////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////
    namespace: Vec<u8>,
    mailbox_size: usize,
    priority: bool,
    handler_limit: usize,
    fetch_timeout: Duration,
    max_data_size: usize,

    ////////////////////////////////////////
    // Messaging
    ////////////////////////////////////////
    /// The mailbox for receiving broadcast requests.
    mailbox_receiver: mpsc::Receiver<ingress::Message<C::PublicKey, H::Digest>>,

    /// Lifecycles of the per-round state machines.
    rounds: Manager<E, C::PublicKey, H::Digest>,

    ////////////////////////////////////////
    // Metrics
    ////////////////////////////////////////
    metrics: metrics::Metrics,
}

impl<
        E: Clock + Spawner + RuntimeMetrics,
        C: Signer,
        H: Hasher,
        V: Verifier<PublicKey = C::PublicKey, Digest = H::Digest>,
        NetS: Sender<PublicKey = C::PublicKey>,
        NetR: Receiver<PublicKey = C::PublicKey>,
    > Engine<E, C, H, V, NetS, NetR>
{
    /// Creates a new engine with the given context and configuration.
    /// Returns the engine and a mailbox for sending messages to the engine.
    pub fn new(context: E, cfg: Config<C, V>) -> (Self, Mailbox<C::PublicKey, H::Digest>) {
        let (mailbox_sender, mailbox_receiver) = mpsc::channel(cfg.mailbox_size);
        let mailbox = Mailbox::new(mailbox_sender);
        let metrics = metrics::Metrics::init(&context);
        let rounds = Manager::new(context.with_label("rounds"), cfg.mailbox_size);

        (
            Self {
                context,
                crypto: cfg.crypto,
                verifier: cfg.verifier,
                _sender: PhantomData,
                _receiver: PhantomData,
                namespace: cfg.namespace,
                mailbox_size: cfg.mailbox_size,
                priority: cfg.priority,
                handler_limit: cfg.handler_limit,
                fetch_timeout: cfg.fetch_timeout,
                max_data_size: cfg.max_data_size,
                mailbox_receiver,
                rounds,
                metrics,
            },
            mailbox,
        )
    }

    /// Starts the engine with the given network.
    pub fn start(mut self, network: (NetS, NetR)) -> Handle<()> {
        self.context.clone().spawn(move |_| self.run(network))
    }

    /// Inner run loop called by `start`.
    async fn run(mut self, network: (NetS, NetR)) {
        let (mut sender, mut receiver) = network;
        let mut shutdown = self.context.stopped();

        // Handlers publish through this queue so the network sender has a
        // single owner.
        let (outbound_sender, mut outbound_receiver) =
            mpsc::channel::<Gossip<C::PublicKey, H::Digest>>(self.mailbox_size);

        // Tracked gossip handlers, oldest first.
        let mut handlers: VecDeque<Handle<()>> = VecDeque::new();

        loop {
            self.metrics.handlers.set(handlers.len() as i64);

            select! {
                // Handle shutdown signal
                _ = &mut shutdown => {
                    debug!("shutdown");
                    break;
                },

                // Handle broadcast requests
                mail = self.mailbox_receiver.next() => {
                    let Some(message) = mail else {
                        debug!("mailbox closed");
                        break;
                    };
                    match message {
                        ingress::Message::Broadcast { message, includers, responder } => {
                            self.handle_broadcast(&mut sender, message, includers, responder).await;
                        }
                    }
                },

                // Publish gossip queued by handlers
                gossip = outbound_receiver.next() => {
                    let Some(gossip) = gossip else {
                        continue;
                    };
                    if let Err(err) = sender
                        .send(Recipients::All, gossip.encode(), self.priority)
                        .await
                    {
                        warn!(?err, "failed to publish gossip");
                    }
                },

                // Handle incoming gossip
                msg = receiver.recv() => {
                    let Ok((peer, bytes)) = msg else {
                        error!("receiver failed");
                        break;
                    };
                    let gossip =
                        match Gossip::<C::PublicKey, H::Digest>::decode_cfg(bytes, &self.max_data_size) {
                            Ok(gossip) => gossip,
                            Err(err) => {
                                warn!(?err, ?peer, "failed to decode gossip");
                                self.metrics.invalid.inc();
                                continue;
                            }
                        };
                    self.spawn_handler(&mut handlers, outbound_sender.clone(), peer, gossip);
                },
            }
        }

        self.rounds.stop().await;
    }

    /// Opens the round, registers this node's own certificate and
    /// attestation, parks the responder on the finalization latch, and
    /// publishes the data.
    async fn handle_broadcast(
        &mut self,
        sender: &mut NetS,
        message: Payload<C::PublicKey, H::Digest>,
        includers: Includers<C::PublicKey>,
        responder: oneshot::Sender<Result<Vec<crate::quorum::Certificate<C::PublicKey, H::Digest>>, Error>>,
    ) {
        let round = message.id.round();
        let mut mailbox = match self.rounds.create(round, Quorum::new(includers)).await {
            Ok(mailbox) => mailbox,
            Err(err) => {
                let _ = responder.send(Err(err));
                return;
            }
        };
        if let Err(err) = mailbox.add(message.clone()).await {
            let _ = responder.send(Err(err));
            return;
        }

        // Attest to our own proposal. The transport does not deliver our
        // gossip back to us, so the local quorum must be fed directly.
        let attestation = Attestation::sign(&self.crypto, &self.namespace, &message.id);
        if let Err(err) = mailbox.attest(message.id.clone(), attestation.clone()).await {
            let _ = responder.send(Err(err));
            return;
        }
        mailbox.finalized(responder).await;
        self.metrics.broadcasts.inc();

        let data = Gossip::Data {
            id: message.id.clone(),
            data: message.data,
        };
        if let Err(err) = sender
            .send(Recipients::All, data.encode(), self.priority)
            .await
        {
            warn!(?err, round, "failed to publish data");
        }
        let gossip = Gossip::Attestation {
            id: message.id,
            attestation,
        };
        if let Err(err) = sender
            .send(Recipients::All, gossip.encode(), self.priority)
            .await
        {
            warn!(?err, round, "failed to publish own attestation");
        }
    }

    /// Dispatches a gossip to a dedicated handler task, aborting the oldest
    /// tracked handler when the cap is exceeded.
    fn spawn_handler(
        &mut self,
        handlers: &mut VecDeque<Handle<()>>,
        outbound: mpsc::Sender<Gossip<C::PublicKey, H::Digest>>,
        peer: C::PublicKey,
        gossip: Gossip<C::PublicKey, H::Digest>,
    ) {
        if handlers.len() >= self.handler_limit {
            if let Some(oldest) = handlers.pop_front() {
                oldest.abort();
            }
        }
        match &gossip {
            Gossip::Data { .. } => self.metrics.data.inc(),
            Gossip::Attestation { .. } => self.metrics.attestations.inc(),
        };

        let rounds = self.rounds.clone();
        let verifier = self.verifier.clone();
        let crypto = self.crypto.clone();
        let namespace = self.namespace.clone();
        let timeout = self.fetch_timeout;
        let handle = self.context.with_label("handler").spawn(move |context| async move {
            match gossip {
                Gossip::Data { id, data } => {
                    handle_data::<E, C, H, V>(
                        context, rounds, verifier, crypto, namespace, outbound, timeout, peer, id,
                        data,
                    )
                    .await;
                }
                Gossip::Attestation { id, attestation } => {
                    handle_attestation::<E, C::PublicKey, H::Digest>(
                        context, rounds, namespace, timeout, peer, id, attestation,
                    )
                    .await;
                }
            }
        });
        handlers.push_back(handle);
    }
}

/// Processes a data gossip: hash check, round lookup, certificate creation,
/// application verification, and attestation.
#[allow(clippy::too_many_arguments)]
async fn handle_data<E, C, H, V>(
    context: E,
    rounds: Manager<E, C::PublicKey, H::Digest>,
    mut verifier: V,
    crypto: C,
    namespace: Vec<u8>,
    mut outbound: mpsc::Sender<Gossip<C::PublicKey, H::Digest>>,
    timeout: Duration,
    peer: C::PublicKey,
    id: MessageId<C::PublicKey, H::Digest>,
    data: bytes::Bytes,
) where
    E: Clock + Spawner + RuntimeMetrics,
    C: Signer,
    H: Hasher,
    V: Verifier<PublicKey = C::PublicKey, Digest = H::Digest>,
{
    // Reject data whose hash is inconsistent with its identifier before
    // touching any state.
    if H::hash(&data) != id.hash() {
        warn!(?peer, id = %id, "data hash mismatch");
        return;
    }
    if let Err(err) = id.validate() {
        warn!(?err, ?peer, "invalid message id");
        return;
    }

    let result = select! {
        result = rounds.get(id.round()) => { result },
        _timeout = context.sleep(timeout) => { Err(Error::Timeout) },
    };
    let mut round = match result {
        Ok(round) => round,
        Err(err) => {
            debug!(?err, round = id.round(), ?peer, "round unavailable");
            return;
        }
    };

    let message = Payload {
        id: id.clone(),
        data,
    };
    if let Err(err) = round.add(message.clone()).await {
        debug!(?err, id = %id, ?peer, "dropping data");
        return;
    }

    if !verifier.verify(message).await {
        warn!(id = %id, ?peer, "message verification failed");
        // The certificate was created above; remove it so a bad proposer
        // cannot grow retained state.
        if let Err(err) = round.delete(id.clone()).await {
            debug!(?err, id = %id, "failed to delete certificate");
        }
        return;
    }

    // Sign the canonical identifier, feed the local quorum, and gossip the
    // attestation.
    let attestation = Attestation::sign(&crypto, &namespace, &id);
    if let Err(err) = round.attest(id.clone(), attestation.clone()).await {
        debug!(?err, id = %id, "failed to record own attestation");
        return;
    }
    let _ = outbound.send(Gossip::Attestation { id, attestation }).await;
}

/// Processes an attestation gossip: round lookup, certificate lookup
/// (parking until the data arrives), signature verification, accumulation.
async fn handle_attestation<E, P, D>(
    context: E,
    rounds: Manager<E, P, D>,
    namespace: Vec<u8>,
    timeout: Duration,
    peer: P,
    id: MessageId<P, D>,
    attestation: Attestation<P>,
) where
    E: Clock + Spawner + RuntimeMetrics,
    P: PublicKey,
    D: Digest,
{
    if let Err(err) = id.validate() {
        warn!(?err, ?peer, "invalid message id");
        return;
    }

    let result = select! {
        result = rounds.get(id.round()) => { result },
        _timeout = context.sleep(timeout) => { Err(Error::Timeout) },
    };
    let mut round = match result {
        Ok(round) => round,
        Err(err) => {
            debug!(?err, round = id.round(), ?peer, "round unavailable");
            return;
        }
    };

    // Ensure the certificate exists before the expensive signature check.
    // This parks when the attestation outruns its data.
    let result = select! {
        result = round.get(id.clone()) => { result },
        _timeout = context.sleep(timeout) => { Err(Error::Timeout) },
    };
    if let Err(err) = result {
        debug!(?err, id = %id, ?peer, "no certificate for attestation");
        return;
    }

    if !attestation.verify(&namespace, &id) {
        warn!(?peer, id = %id, "invalid attestation signature");
        return;
    }
    if let Err(err) = round.attest(id, attestation).await {
        debug!(?err, ?peer, "dropping attestation");
    }
}
