//! In-memory batch pool.

use super::{Batch, Error, Pool};
use commonware_cryptography::{Digest, PublicKey};
use commonware_macros::select;
use commonware_runtime::{Clock, Spawner};
use futures::channel::oneshot;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::debug;

/// Configuration for [`Mem`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How often the garbage collector scans for stale batches.
    pub gc_interval: Duration,

    /// How long a batch may sit unconsumed before it is evicted.
    pub staleness: Duration,
}

struct Entry<P: PublicKey, D: Digest> {
    batch: Batch<P, D>,
    at: SystemTime,
}

struct State<P: PublicKey, D: Digest> {
    batches: BTreeMap<D, Entry<P, D>>,

    /// Parked pulls by digest.
    pull_subscribers: BTreeMap<D, Vec<oneshot::Sender<Result<Batch<P, D>, Error>>>>,

    /// Parked listings, woken by any push to retry.
    list_subscribers: Vec<oneshot::Sender<()>>,
}

impl<P: PublicKey, D: Digest> State<P, D> {
    /// Drop a batch and release any pulls parked on its digest.
    ///
    /// Pulls may be parked on a digest that is no longer (or was never)
    /// stored; releasing them here is what resolves the race between
    /// verification and eviction.
    fn remove(&mut self, digest: &D) {
        self.batches.remove(digest);
        if let Some(subscribers) = self.pull_subscribers.remove(digest) {
            for subscriber in subscribers {
                let _ = subscriber.send(Err(Error::BatchDeleted));
            }
        }
    }
}

/// An in-memory [`Pool`] with background garbage collection.
pub struct Mem<E: Clock + Spawner, P: PublicKey, D: Digest> {
    context: E,
    state: Arc<Mutex<State<P, D>>>,
}

impl<E: Clock + Spawner, P: PublicKey, D: Digest> Clone for Mem<E, P, D> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            state: self.state.clone(),
        }
    }
}

impl<E: Clock + Spawner, P: PublicKey, D: Digest> Mem<E, P, D> {
    /// Create a pool and spawn its garbage collector on the given context.
    pub fn new(context: E, cfg: Config) -> Self {
        let state = Arc::new(Mutex::new(State {
            batches: BTreeMap::new(),
            pull_subscribers: BTreeMap::new(),
            list_subscribers: Vec::new(),
        }));
        let pool = Self {
            context: context.clone(),
            state: state.clone(),
        };
        context.spawn(move |context| async move {
            let mut shutdown = context.stopped();
            loop {
                select! {
                    _ = &mut shutdown => { return; },
                    _tick = context.sleep(cfg.gc_interval) => {},
                };

                let now = context.current();
                let mut state = state.lock().unwrap();
                let stale: Vec<D> = state
                    .batches
                    .iter()
                    .filter(|(_, entry)| entry.at + cfg.staleness <= now)
                    .map(|(digest, _)| *digest)
                    .collect();
                for digest in &stale {
                    state.remove(digest);
                }
                if !stale.is_empty() {
                    debug!(evicted = stale.len(), "evicted stale batches");
                }

                // Drop parked operations whose callers went away.
                state.pull_subscribers.retain(|_, subscribers| {
                    subscribers.retain(|subscriber| !subscriber.is_canceled());
                    !subscribers.is_empty()
                });
                state
                    .list_subscribers
                    .retain(|subscriber| !subscriber.is_canceled());
            }
        });
        pool
    }
}

impl<E: Clock + Spawner, P: PublicKey, D: Digest> Pool for Mem<E, P, D> {
    type PublicKey = P;
    type Digest = D;

    async fn push(&mut self, batch: Batch<P, D>) {
        let at = self.context.current();
        let mut state = self.state.lock().unwrap();
        let digest = batch.digest();

        // Resolve parked pulls before storing.
        if let Some(subscribers) = state.pull_subscribers.remove(&digest) {
            for subscriber in subscribers {
                let _ = subscriber.send(Ok(batch.clone()));
            }
        }
        state.batches.insert(digest, Entry { batch, at });

        // Wake parked listings to retry.
        for subscriber in state.list_subscribers.drain(..) {
            let _ = subscriber.send(());
        }
    }

    async fn pull(&mut self, digest: D) -> Result<Batch<P, D>, Error> {
        let receiver = {
            let mut state = self.state.lock().unwrap();
            if let Some(entry) = state.batches.get(&digest) {
                return Ok(entry.batch.clone());
            }
            let (subscriber, receiver) = oneshot::channel();
            state
                .pull_subscribers
                .entry(digest)
                .or_default()
                .push(subscriber);
            receiver
        };
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(Error::BatchDeleted),
        }
    }

    async fn list_by_signer(&mut self, signer: P) -> Vec<Batch<P, D>> {
        loop {
            let receiver = {
                let mut state = self.state.lock().unwrap();
                let batches: Vec<_> = state
                    .batches
                    .values()
                    .filter(|entry| entry.batch.signer == signer)
                    .map(|entry| entry.batch.clone())
                    .collect();
                if !batches.is_empty() {
                    return batches;
                }
                let (subscriber, receiver) = oneshot::channel();
                state.list_subscribers.push(subscriber);
                receiver
            };
            // Retry on every wake; spurious wakes just loop again.
            let _ = receiver.await;
        }
    }

    async fn delete(&mut self, digest: &D) {
        let mut state = self.state.lock().unwrap();
        state.remove(digest);
    }

    async fn size(&mut self) -> usize {
        self.state.lock().unwrap().batches.len()
    }
}
