use crate::quorum::Certificate;
use commonware_cryptography::{Digest, PublicKey};
use futures::{
    channel::{mpsc, oneshot},
    SinkExt, StreamExt,
};
use std::collections::BTreeMap;

enum Message<P: PublicKey, D: Digest> {
    Finalized {
        round: u64,
        certificates: Vec<Certificate<P, D>>,
    },
    Get {
        round: u64,
        responder: oneshot::Sender<Option<Vec<Certificate<P, D>>>>,
    },
    Tip {
        responder: oneshot::Sender<Option<u64>>,
    },
}

/// Records the certificates of every finalized round for inspection.
pub struct Reporter<P: PublicKey, D: Digest> {
    mailbox: mpsc::Receiver<Message<P, D>>,

    /// Certificates by round.
    rounds: BTreeMap<u64, Vec<Certificate<P, D>>>,
}

impl<P: PublicKey, D: Digest> Reporter<P, D> {
    pub fn new() -> (Self, Mailbox<P, D>) {
        let (sender, mailbox) = mpsc::channel(1024);
        (
            Self {
                mailbox,
                rounds: BTreeMap::new(),
            },
            Mailbox { sender },
        )
    }

    pub async fn run(mut self) {
        while let Some(message) = self.mailbox.next().await {
            match message {
                Message::Finalized {
                    round,
                    certificates,
                } => {
                    self.rounds.insert(round, certificates);
                }
                Message::Get { round, responder } => {
                    let _ = responder.send(self.rounds.get(&round).cloned());
                }
                Message::Tip { responder } => {
                    let _ = responder.send(self.rounds.keys().next_back().copied());
                }
            }
        }
    }
}

/// Handle to a running [`Reporter`].
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

impl<P: PublicKey, D: Digest> crate::Reporter for Mailbox<P, D> {
    type PublicKey = P;
    type Digest = D;

    async fn report(&mut self, round: u64, certificates: Vec<Certificate<P, D>>) {
        let _ = self
            .sender
            .send(Message::Finalized {
                round,
                certificates,
            })
            .await;
    }
}

impl<P: PublicKey, D: Digest> Mailbox<P, D> {
    /// The certificates reported for a round, if any.
    pub async fn get(&mut self, round: u64) -> Option<Vec<Certificate<P, D>>> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Get { round, responder })
            .await
            .unwrap();
        receiver.await.unwrap()
    }

    /// The highest round reported so far.
    pub async fn tip(&mut self) -> Option<u64> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Tip { responder })
            .await
            .unwrap();
        receiver.await.unwrap()
    }
}
