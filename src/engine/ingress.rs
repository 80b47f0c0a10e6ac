//! Ingress mailbox for the broadcast engine.

use super::Error;
use crate::{
    quorum::{Certificate, Includers},
    types::Message as Payload,
    Broadcaster,
};
use commonware_cryptography::{Digest, PublicKey};
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};

/// Requests that can be sent to the engine.
pub(super) enum Message<P: PublicKey, D: Digest> {
    /// Broadcast a message and resolve once its round finalizes.
    Broadcast {
        message: Payload<P, D>,
        includers: Includers<P>,
        responder: oneshot::Sender<Result<Vec<Certificate<P, D>>, Error>>,
    },
}

/// Mailbox for the [`Engine`](super::Engine). Implements [`Broadcaster`].
pub struct Mailbox<P: PublicKey, D: Digest> {
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
    pub(super) fn new(sender: mpsc::Sender<Message<P, D>>) -> Self {
        Self { sender }
    }
}

impl<P: PublicKey, D: Digest> Broadcaster for Mailbox<P, D> {
    type PublicKey = P;
    type Digest = D;

    async fn broadcast(
        &mut self,
        message: Payload<P, D>,
        includers: Includers<P>,
    ) -> Result<Vec<Certificate<P, D>>, Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Broadcast {
                message,
                includers,
                responder,
            })
            .await
            .map_err(|_| Error::EngineClosed)?;
        receiver.await.map_err(|_| Error::RoundClosed)?
    }
}
