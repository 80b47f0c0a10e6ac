use std::time::Duration;

/// Configuration for the [`Engine`](super::Engine).
pub struct Config<C, V> {
    /// The signing scheme of this participant.
    pub crypto: C,

    /// Application-specific verification of delivered messages.
    pub verifier: V,

    /// Namespace for attestation signatures. All participants of a network
    /// must use the same namespace, and distinct networks must use distinct
    /// namespaces.
    pub namespace: Vec<u8>,

    /// The maximum size of backlogs (engine mailbox, per-round operations,
    /// outbound gossip queue).
    pub mailbox_size: usize,

    /// Whether gossip is sent over the network as priority.
    pub priority: bool,

    /// The maximum number of concurrently executing gossip handlers. When a
    /// new handler exceeds the cap, the oldest one is aborted.
    pub handler_limit: usize,

    /// How long a gossip handler may park waiting for a round or a
    /// certificate before the message is treated as stale.
    pub fetch_timeout: Duration,

    /// The maximum accepted payload length of a data gossip.
    pub max_data_size: usize,
}
