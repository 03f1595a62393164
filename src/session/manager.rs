//! Sliding-window session lifecycle

use super::activity::ActivityKind;
use crate::auth::AuthService;
use crate::bus::{Delivery, Signal, Subscription};
use crate::cancel::CancellationToken;
use crate::config::SessionConfig;
use crate::sync::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What happened to one activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Nobody is signed in
    Detached,
    /// Within the throttle interval of the last accepted event
    Throttled,
    Refreshed,
    /// The refresh call failed; the next expiry check decides
    RefreshFailed,
}

/// Result of one expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    Detached,
    Active,
    SignedOut,
}

#[derive(Debug, Default)]
struct SessionClock {
    attached: bool,
    last_activity: Option<Instant>,
}

/// Keeps a session alive while the user is active and ends it once the
/// auth collaborator reports it expired.
///
/// Activity is accepted at most once per throttle interval; each accepted
/// event refreshes the session. A poll asks whether the session expired and
/// forces a single sign-out if so. The manager only acts while attached,
/// which `run` tracks from the bus's auth signals.
pub struct SessionManager {
    auth: Arc<dyn AuthService>,
    throttle: Duration,
    poll_interval: Duration,
    clock: Mutex<SessionClock>,
}

impl SessionManager {
    /// Starts attached if someone is already signed in.
    pub fn new(auth: Arc<dyn AuthService>, config: &SessionConfig) -> Self {
        let attached = auth.current_identity().is_some();
        Self {
            auth,
            throttle: config.throttle(),
            poll_interval: config.poll_interval(),
            clock: Mutex::new(SessionClock {
                attached,
                last_activity: None,
            }),
        }
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Start observing activity, with a fresh clock
    pub fn attach(&self) {
        let mut clock = lock(&self.clock);
        clock.attached = true;
        clock.last_activity = None;
        debug!("session manager attached");
    }

    pub fn detach(&self) {
        let mut clock = lock(&self.clock);
        clock.attached = false;
        clock.last_activity = None;
        debug!("session manager detached");
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.clock).attached
    }

    /// When the last activity event was accepted
    pub fn last_activity(&self) -> Option<Instant> {
        lock(&self.clock).last_activity
    }

    /// Feed one activity event.
    pub async fn record_activity(&self, kind: ActivityKind) -> ActivityOutcome {
        {
            let mut clock = lock(&self.clock);
            if !clock.attached {
                return ActivityOutcome::Detached;
            }
            if let Some(last) = clock.last_activity {
                if last.elapsed() <= self.throttle {
                    return ActivityOutcome::Throttled;
                }
            }
            clock.last_activity = Some(Instant::now());
        }

        match self.auth.refresh_session().await {
            Ok(()) => {
                debug!(%kind, "session refreshed");
                ActivityOutcome::Refreshed
            }
            Err(e) => {
                warn!(%kind, error = %e, "session refresh failed");
                ActivityOutcome::RefreshFailed
            }
        }
    }

    /// Sign out if the session expired.
    ///
    /// The manager detaches before signing out, so one expiry produces one
    /// sign-out no matter how many checks follow.
    pub async fn check_expiry(&self) -> ExpiryOutcome {
        if !self.is_attached() {
            return ExpiryOutcome::Detached;
        }
        if !self.auth.session_expired() {
            return ExpiryOutcome::Active;
        }

        self.detach();
        info!("session expired, signing out");
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "sign-out after expiry failed");
        }
        ExpiryOutcome::SignedOut
    }

    /// Recompute attachment from the auth collaborator after the bus dropped
    /// signals, any of which may have been an auth change.
    ///
    /// The clock is left alone when attachment is already right.
    pub fn resync(&self, missed: u64) {
        let signed_in = self.auth.current_identity().is_some();
        if signed_in == self.is_attached() {
            return;
        }
        debug!(missed, signed_in, "session manager resynced after lag");
        if signed_in {
            self.attach();
        } else {
            self.detach();
        }
    }

    /// Drive the manager until `cancel` fires.
    ///
    /// Polls for expiry every `poll_interval`, feeds events from `activity`,
    /// and attaches or detaches on auth signals from `signals`. Stops early
    /// if the activity channel or the bus closes.
    pub async fn run(
        &self,
        mut activity: mpsc::Receiver<ActivityKind>,
        mut signals: Subscription,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(poll_ms = self.poll_interval.as_millis() as u64, "session manager running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check_expiry().await;
                }
                event = activity.recv() => match event {
                    Some(kind) => {
                        self.record_activity(kind).await;
                    }
                    None => break,
                },
                delivery = signals.recv() => match delivery {
                    Some(Delivery::Signal(Signal::AuthChanged { authenticated: true })) => self.attach(),
                    Some(Delivery::Signal(Signal::AuthChanged { authenticated: false })) => self.detach(),
                    Some(Delivery::Lagged(missed)) => self.resync(missed),
                    Some(Delivery::Signal(_)) => {}
                    None => break,
                },
            }
        }
        debug!("session manager stopped");
    }

    /// Spawn `run` on the runtime.
    pub fn spawn(
        self: &Arc<Self>,
        activity: mpsc::Receiver<ActivityKind>,
        signals: Subscription,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run(activity, signals, cancel).await })
    }
}
