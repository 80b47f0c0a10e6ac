//! Per-round state machine.
//!
//! An [`Actor`] owns exactly one [`Quorum`] and serializes every mutation
//! through its mailbox, converting the racy arrival of gossip into a
//! deterministic sequence of state transitions. Waiters for certificates
//! that have not arrived yet are parked in a subscription table and resolved
//! by the loop itself, so a waiter can never observe a torn state.

use super::Error;
use crate::{
    quorum::{Certificate, Quorum},
    types::{Attestation, Message as Payload, MessageId},
};
use commonware_cryptography::{Digest, PublicKey};
use commonware_runtime::{Handle, Spawner};
use futures::{
    channel::{mpsc, oneshot},
    SinkExt, StreamExt,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Operations on the round state machine.
pub(super) enum Message<P: PublicKey, D: Digest> {
    /// Insert a new certificate for a message.
    Add {
        message: Payload<P, D>,
        responder: oneshot::Sender<Result<(), Error>>,
    },

    /// Fetch a certificate, parking until it exists. Cancel by dropping the
    /// receiver.
    Get {
        id: MessageId<P, D>,
        responder: oneshot::Sender<Result<Certificate<P, D>, Error>>,
    },

    /// Remove a certificate (local verification failed).
    Delete {
        id: MessageId<P, D>,
        responder: oneshot::Sender<Result<(), Error>>,
    },

    /// Append a pre-verified attestation to a certificate.
    Attest {
        id: MessageId<P, D>,
        attestation: Attestation<P>,
        responder: oneshot::Sender<Result<(), Error>>,
    },

    /// Park on the finalization latch. Resolves with a snapshot of all
    /// certificates as soon as the quorum finalizes.
    Finalized {
        responder: oneshot::Sender<Result<Vec<Certificate<P, D>>, Error>>,
    },

    /// Drain every accepted operation, fail outstanding waiters, and exit.
    Stop {
        responder: oneshot::Sender<()>,
    },
}

/// Handle for submitting operations to a [`Actor`].
pub(super) struct Mailbox<P: PublicKey, D: Digest> {
    sender: mpsc::Sender<Message<P, D>>,
}

impl<P: PublicKey, D: Digest> Clone for Mailbox<P, D> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<P: PublicKey, D: Digest> Mailbox<P, D> {
    pub(super) async fn add(&mut self, message: Payload<P, D>) -> Result<(), Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Add { message, responder })
            .await
            .map_err(|_| Error::RoundClosed)?;
        receiver.await.map_err(|_| Error::RoundClosed)?
    }

    pub(super) async fn get(&mut self, id: MessageId<P, D>) -> Result<Certificate<P, D>, Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Get { id, responder })
            .await
            .map_err(|_| Error::RoundClosed)?;
        receiver.await.map_err(|_| Error::RoundClosed)?
    }

    pub(super) async fn delete(&mut self, id: MessageId<P, D>) -> Result<(), Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Delete { id, responder })
            .await
            .map_err(|_| Error::RoundClosed)?;
        receiver.await.map_err(|_| Error::RoundClosed)?
    }

    pub(super) async fn attest(
        &mut self,
        id: MessageId<P, D>,
        attestation: Attestation<P>,
    ) -> Result<(), Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Attest {
                id,
                attestation,
                responder,
            })
            .await
            .map_err(|_| Error::RoundClosed)?;
        receiver.await.map_err(|_| Error::RoundClosed)?
    }

    /// Register a responder on the finalization latch.
    pub(super) async fn finalized(
        &mut self,
        responder: oneshot::Sender<Result<Vec<Certificate<P, D>>, Error>>,
    ) {
        let _ = self.sender.send(Message::Finalized { responder }).await;
    }

    /// Stop the round and wait for its drain to complete.
    pub(super) async fn stop(&mut self) {
        let (responder, receiver) = oneshot::channel();
        if self.sender.send(Message::Stop { responder }).await.is_err() {
            return;
        }
        let _ = receiver.await;
    }
}

/// The round state machine.
pub(super) struct Actor<E: Spawner, P: PublicKey, D: Digest> {
    context: E,
    number: u64,
    quorum: Quorum<P, D>,
    mailbox: mpsc::Receiver<Message<P, D>>,

    /// Parked certificate waiters by identifier.
    waiters: BTreeMap<MessageId<P, D>, Vec<oneshot::Sender<Result<Certificate<P, D>, Error>>>>,

    /// Parked finalization waiters.
    latch: Vec<oneshot::Sender<Result<Vec<Certificate<P, D>>, Error>>>,

    /// Whether the finalization latch has fired.
    finalized: bool,
}

impl<E: Spawner, P: PublicKey, D: Digest> Actor<E, P, D> {
    pub(super) fn new(
        context: E,
        number: u64,
        quorum: Quorum<P, D>,
        mailbox_size: usize,
    ) -> (Self, Mailbox<P, D>) {
        let (sender, mailbox) = mpsc::channel(mailbox_size);
        (
            Self {
                context,
                number,
                quorum,
                mailbox,
                waiters: BTreeMap::new(),
                latch: Vec::new(),
                finalized: false,
            },
            Mailbox { sender },
        )
    }

    pub(super) fn start(mut self) -> Handle<()> {
        self.context.clone().spawn(move |_| self.run())
    }

    async fn run(mut self) {
        let mut stopped = None;
        while let Some(message) = self.mailbox.next().await {
            self.cleanup_waiters();
            if let Message::Stop { responder } = message {
                stopped = Some(responder);
                break;
            }
            self.handle(message);
        }
        // Either a stop was requested or every mailbox was dropped: execute
        // the operations already accepted, then fail anything still parked.
        // This is what makes last-minute attestations at a round boundary
        // safe.
        while let Ok(Some(message)) = self.mailbox.try_next() {
            if let Message::Stop { responder } = message {
                let _ = responder.send(());
                continue;
            }
            self.handle(message);
        }
        for (_, waiters) in std::mem::take(&mut self.waiters) {
            for waiter in waiters {
                let _ = waiter.send(Err(Error::ElapsedRound(self.number)));
            }
        }
        for waiter in self.latch.drain(..) {
            let _ = waiter.send(Err(Error::RoundClosed));
        }
        if let Some(responder) = stopped {
            let _ = responder.send(());
        }
        debug!(round = self.number, "round stopped");
    }

    /// Apply one operation.
    fn handle(&mut self, message: Message<P, D>) {
        match message {
            Message::Add { message, responder } => {
                let _ = responder.send(self.handle_add(message));
            }
            Message::Get { id, responder } => match self.quorum.get(&id) {
                Some(certificate) => {
                    let _ = responder.send(Ok(certificate.clone()));
                }
                None => self.waiters.entry(id).or_default().push(responder),
            },
            Message::Delete { id, responder } => {
                let _ = responder.send(self.quorum.delete(&id).map_err(Error::Quorum));
            }
            Message::Attest {
                id,
                attestation,
                responder,
            } => {
                let _ = responder.send(self.handle_attest(id, attestation));
            }
            Message::Finalized { responder } => {
                if self.finalized {
                    let _ = responder.send(Ok(self.quorum.list()));
                } else {
                    self.latch.push(responder);
                }
            }
            // Intercepted by the run loop.
            Message::Stop { .. } => unreachable!("stop is handled by the loop"),
        }
    }

    fn handle_add(&mut self, message: Payload<P, D>) -> Result<(), Error> {
        let id = message.id.clone();
        self.quorum.add(message)?;

        // Resolve any waiters parked on this identifier.
        let Some(waiters) = self.waiters.remove(&id) else {
            return Ok(());
        };
        let certificate = self
            .quorum
            .get(&id)
            .expect("certificate must exist after add");
        for waiter in waiters {
            let _ = waiter.send(Ok(certificate.clone()));
        }
        Ok(())
    }

    fn handle_attest(
        &mut self,
        id: MessageId<P, D>,
        attestation: Attestation<P>,
    ) -> Result<(), Error> {
        let completed = self.quorum.attest(&id, attestation)?;
        if !completed || self.finalized || !self.quorum.finalized() {
            return Ok(());
        }

        // The quorum just finalized: fire the latch exactly once.
        self.finalized = true;
        let certificates = self.quorum.list();
        debug!(
            round = self.number,
            certificates = certificates.len(),
            "round finalized"
        );
        for waiter in self.latch.drain(..) {
            let _ = waiter.send(Ok(certificates.clone()));
        }
        Ok(())
    }

    /// Drop waiters whose receivers were cancelled. Running on the loop
    /// keeps cancellation ordered with respect to racing adds.
    fn cleanup_waiters(&mut self) {
        self.waiters.retain(|_, waiters| {
            waiters.retain(|waiter| !waiter.is_canceled());
            !waiters.is_empty()
        });
        self.latch.retain(|waiter| !waiter.is_canceled());
    }
}
