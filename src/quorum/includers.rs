//! Stake-weighted membership.

use super::Error;
use commonware_cryptography::PublicKey;

/// The maximum cumulative stake of an includer set.
///
/// Staying well below `i64::MAX` keeps additive accumulation of stakes free
/// of overflow even when several totals are summed together.
pub const MAX_STAKE: i64 = i64::MAX / 8;

/// Add two stakes, saturating at the `i64` range.
///
/// A result beyond [`MAX_STAKE`] indicates a misconfigured membership or a
/// protocol bug and aborts the process.
pub(crate) fn add_stake(total: i64, stake: i64) -> i64 {
    let sum = total.saturating_add(stake);
    assert!(
        sum <= MAX_STAKE,
        "total stake exceeds maximum: got {sum}, max {MAX_STAKE}"
    );
    sum
}

/// A round participant that may propose and attest, weighed by stake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Includer<P: PublicKey> {
    /// Identity of the participant.
    pub public_key: P,

    /// Voting weight. Never negative.
    pub stake: i64,
}

impl<P: PublicKey> Includer<P> {
    /// Create a new includer.
    pub fn new(public_key: P, stake: i64) -> Self {
        Self { public_key, stake }
    }

    /// Basic well-formedness.
    pub fn validate(&self) -> Result<(), Error> {
        if self.stake < 0 {
            return Err(Error::NegativeStake);
        }
        Ok(())
    }
}

/// An immutable set of includers, sorted by stake descending with a
/// lexicographic tiebreak on the public key.
#[derive(Clone, Debug)]
pub struct Includers<P: PublicKey> {
    includers: Vec<Includer<P>>,
    total_stake: i64,
}

impl<P: PublicKey> Includers<P> {
    /// Build a set from the given includers.
    ///
    /// Panics if the cumulative stake exceeds [`MAX_STAKE`].
    pub fn new(mut includers: Vec<Includer<P>>) -> Self {
        includers.sort_by(|a, b| {
            b.stake
                .cmp(&a.stake)
                .then_with(|| a.public_key.cmp(&b.public_key))
        });
        let mut total_stake = 0i64;
        for includer in &includers {
            total_stake = add_stake(total_stake, includer.stake);
        }
        Self {
            includers,
            total_stake,
        }
    }

    /// Basic well-formedness of every member.
    pub fn validate(&self) -> Result<(), Error> {
        if self.includers.is_empty() {
            return Err(Error::EmptyIncluders);
        }
        for includer in &self.includers {
            includer.validate()?;
        }
        Ok(())
    }

    /// Look up an includer by public key.
    ///
    /// Linear scan: membership sets are small (tens to low hundreds).
    pub fn get(&self, public_key: &P) -> Option<&Includer<P>> {
        self.includers
            .iter()
            .find(|includer| &includer.public_key == public_key)
    }

    /// The cumulative stake of the set.
    pub fn total_stake(&self) -> i64 {
        self.total_stake
    }

    /// The number of includers.
    pub fn len(&self) -> usize {
        self.includers.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.includers.is_empty()
    }

    /// Iterate over the includers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Includer<P>> {
        self.includers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt, Signer};

    fn key(seed: u64) -> commonware_cryptography::ed25519::PublicKey {
        PrivateKey::from_seed(seed).public_key()
    }

    #[test]
    fn test_sorted_by_stake_then_key() {
        let mut keys = vec![key(0), key(1), key(2)];
        keys.sort();
        let includers = Includers::new(vec![
            Includer::new(keys[0].clone(), 5),
            Includer::new(keys[2].clone(), 10),
            Includer::new(keys[1].clone(), 5),
        ]);
        let order: Vec<_> = includers.iter().map(|i| i.public_key.clone()).collect();
        assert_eq!(order, vec![keys[2].clone(), keys[0].clone(), keys[1].clone()]);
        assert_eq!(includers.total_stake(), 20);
        assert_eq!(includers.len(), 3);
    }

    #[test]
    fn test_get_by_public_key() {
        let includers = Includers::new(vec![
            Includer::new(key(0), 1),
            Includer::new(key(1), 2),
        ]);
        assert_eq!(includers.get(&key(1)).unwrap().stake, 2);
        assert!(includers.get(&key(9)).is_none());
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            Includers::<commonware_cryptography::ed25519::PublicKey>::new(vec![]).validate(),
            Err(Error::EmptyIncluders)
        );
        assert_eq!(
            Includers::new(vec![Includer::new(key(0), -1)]).validate(),
            Err(Error::NegativeStake)
        );
        assert!(Includers::new(vec![Includer::new(key(0), 0)])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_total_stake_at_max_allowed() {
        let includers = Includers::new(vec![
            Includer::new(key(0), MAX_STAKE - 1),
            Includer::new(key(1), 1),
        ]);
        assert_eq!(includers.total_stake(), MAX_STAKE);
    }

    #[test]
    #[should_panic(expected = "total stake exceeds maximum")]
    fn test_total_stake_overflow_is_fatal() {
        Includers::new(vec![
            Includer::new(key(0), MAX_STAKE),
            Includer::new(key(1), 1),
        ]);
    }
}
