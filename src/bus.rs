//! Global invalidation bus
//!
//! A process-wide publish/subscribe channel carrying "something changed, go
//! re-fetch" signals. Publishing is synchronous: every current subscriber has
//! the signal queued before `publish` returns. Signals are not deduplicated.
//!
//! A `Subscription` is an owned value. Dropping it unsubscribes, so a
//! subscriber stored inside a context lives exactly as long as the context.

use crate::domain::EntityKind;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

/// An invalidation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Fired once per sign-in and once per sign-out
    AuthChanged { authenticated: bool },
    /// Fired after a successful mutation of any record of `kind`
    CollectionChanged { kind: EntityKind },
}

impl Signal {
    /// True if a cache of `kind` should re-fetch on this signal
    pub fn concerns(&self, kind: EntityKind) -> bool {
        match self {
            Self::AuthChanged { .. } => true,
            Self::CollectionChanged { kind: changed } => *changed == kind,
        }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Signal(Signal),
    /// The subscriber fell behind and `n` signals were dropped. Treat as an
    /// invalidation of everything the subscriber cares about.
    Lagged(u64),
}

/// Handle to the bus. Cheap to clone; all clones publish to the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<Signal>,
}

impl InvalidationBus {
    /// Default number of undelivered signals a subscriber may hold
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Queue `signal` for every current subscriber.
    ///
    /// Returns the number of subscribers reached. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, signal: Signal) -> usize {
        let reached = self.tx.send(signal).unwrap_or(0);
        debug!(?signal, reached, "invalidation published");
        reached
    }

    pub fn auth_changed(&self, authenticated: bool) -> usize {
        self.publish(Signal::AuthChanged { authenticated })
    }

    pub fn collection_changed(&self, kind: EntityKind) -> usize {
        self.publish(Signal::CollectionChanged { kind })
    }

    /// Start receiving signals published from now on
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// A live subscription to the bus.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Signal>,
}

impl Subscription {
    /// Wait for the next delivery. Returns `None` once every bus handle has
    /// been dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.rx.recv().await {
            Ok(signal) => Some(Delivery::Signal(signal)),
            Err(RecvError::Lagged(n)) => Some(Delivery::Lagged(n)),
            Err(RecvError::Closed) => None,
        }
    }

    /// Take the next queued delivery without waiting
    pub fn try_recv(&mut self) -> Option<Delivery> {
        match self.rx.try_recv() {
            Ok(signal) => Some(Delivery::Signal(signal)),
            Err(TryRecvError::Lagged(n)) => Some(Delivery::Lagged(n)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Drain everything queued right now
    pub fn drain(&mut self) -> Vec<Delivery> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
