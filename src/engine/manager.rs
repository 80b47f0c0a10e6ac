//! Round lifecycle across consecutive rounds.

use super::{round, Error};
use crate::quorum::Quorum;
use commonware_cryptography::{Digest, PublicKey};
use commonware_runtime::{Metrics, Spawner};
use futures::channel::oneshot;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Waiters for a round that has not been created yet.
type Subscribers<P, D> = Vec<oneshot::Sender<Result<round::Mailbox<P, D>, Error>>>;

struct State<P: PublicKey, D: Digest> {
    rounds: BTreeMap<u64, round::Mailbox<P, D>>,
    subscribers: BTreeMap<u64, Subscribers<P, D>>,
    /// Highest round ever created. Monotonically non-decreasing; rounds are
    /// numbered from one.
    latest: u64,
}

/// Creates, serves, and stops [`round::Actor`]s.
///
/// The lock is never held across an await: subscriptions are registered
/// under it and awaited outside it, and the previous round is stopped after
/// it is released.
pub(super) struct Manager<E: Spawner + Metrics, P: PublicKey, D: Digest> {
    context: E,
    mailbox_size: usize,
    state: Arc<Mutex<State<P, D>>>,
}

impl<E: Spawner + Metrics, P: PublicKey, D: Digest> Clone for Manager<E, P, D> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            mailbox_size: self.mailbox_size,
            state: self.state.clone(),
        }
    }
}

impl<E: Spawner + Metrics, P: PublicKey, D: Digest> Manager<E, P, D> {
    pub(super) fn new(context: E, mailbox_size: usize) -> Self {
        Self {
            context,
            mailbox_size,
            state: Arc::new(Mutex::new(State {
                rounds: BTreeMap::new(),
                subscribers: BTreeMap::new(),
                latest: 0,
            })),
        }
    }

    /// Create the round `number`, notifying subscribers and atomically
    /// stopping the previous latest round.
    ///
    /// Fails with [`Error::ElapsedRound`] if `number` is not ahead of every
    /// round created so far.
    pub(super) async fn create(
        &self,
        number: u64,
        quorum: Quorum<P, D>,
    ) -> Result<round::Mailbox<P, D>, Error> {
        let (mailbox, previous) = {
            let mut state = self.state.lock().unwrap();
            let latest = state.latest;
            if number <= latest {
                return Err(Error::ElapsedRound(number));
            }
            let previous = state.rounds.remove(&latest);
            state.latest = number;

            let (actor, mailbox) = round::Actor::new(
                self.context.with_label("round"),
                number,
                quorum,
                self.mailbox_size,
            );
            actor.start();
            state.rounds.insert(number, mailbox.clone());

            // Serve subscribers for this round; anything parked on an older
            // round can never be fulfilled now.
            let keep = state.subscribers.split_off(&(number + 1));
            let flush = std::mem::replace(&mut state.subscribers, keep);
            for (subscribed, subscribers) in flush {
                for subscriber in subscribers {
                    let result = if subscribed == number {
                        Ok(mailbox.clone())
                    } else {
                        Err(Error::ElapsedRound(subscribed))
                    };
                    let _ = subscriber.send(result);
                }
            }
            (mailbox, previous)
        };

        // Stop the previous round outside the lock, draining any operations
        // it already accepted.
        if let Some(mut previous) = previous {
            previous.stop().await;
        }
        debug!(round = number, "round created");
        Ok(mailbox)
    }

    /// Fetch the round `number`, parking until it is created.
    ///
    /// Fails with [`Error::ElapsedRound`] if the round is already in the
    /// past. Cancel by dropping the future.
    pub(super) async fn get(&self, number: u64) -> Result<round::Mailbox<P, D>, Error> {
        let receiver = {
            let mut state = self.state.lock().unwrap();
            if number < state.latest {
                return Err(Error::ElapsedRound(number));
            }
            if let Some(mailbox) = state.rounds.get(&number) {
                return Ok(mailbox.clone());
            }
            let (subscriber, receiver) = oneshot::channel();
            state.subscribers.entry(number).or_default().push(subscriber);
            receiver
        };
        receiver.await.map_err(|_| Error::ElapsedRound(number))?
    }

    /// Stop every round and drop every subscription.
    pub(super) async fn stop(&self) {
        let (rounds, subscribers) = {
            let mut state = self.state.lock().unwrap();
            (
                std::mem::take(&mut state.rounds),
                std::mem::take(&mut state.subscribers),
            )
        };
        drop(subscribers);
        for (_, mut round) in rounds {
            round.stop().await;
        }
    }
}
