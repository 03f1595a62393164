//! In-process authentication with a sliding expiry window

use super::traits::{AuthError, AuthResult, AuthService, Identity};
use crate::bus::InvalidationBus;
use crate::sync::lock;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
struct ActiveSession {
    identity: Identity,
    last_refreshed: Instant,
}

/// Local authentication state.
///
/// Holds at most one identity. The session expires when more than
/// `expiry_window` has passed since sign-in or the last refresh.
#[derive(Debug)]
pub struct LocalAuth {
    session: Mutex<Option<ActiveSession>>,
    expiry_window: Duration,
    bus: InvalidationBus,
}

impl LocalAuth {
    pub fn new(bus: InvalidationBus, expiry_window: Duration) -> Self {
        Self {
            session: Mutex::new(None),
            expiry_window,
            bus,
        }
    }

    /// Sign in as `identity`.
    ///
    /// Signing in while another identity is active signs that one out first,
    /// so listeners see a sign-out followed by a sign-in.
    pub fn sign_in(&self, identity: Identity) {
        let previous = {
            let mut session = lock(&self.session);
            session.replace(ActiveSession {
                identity: identity.clone(),
                last_refreshed: Instant::now(),
            })
        };
        if let Some(previous) = previous {
            info!(uid = %previous.identity.uid, "replacing active session");
            self.bus.auth_changed(false);
        }
        info!(uid = %identity.uid, "signed in");
        self.bus.auth_changed(true);
    }

    pub fn expiry_window(&self) -> Duration {
        self.expiry_window
    }

    /// Time elapsed since the last refresh, if signed in
    pub fn idle_for(&self) -> Option<Duration> {
        lock(&self.session)
            .as_ref()
            .map(|s| s.last_refreshed.elapsed())
    }
}

#[async_trait]
impl AuthService for LocalAuth {
    fn current_identity(&self) -> Option<Identity> {
        lock(&self.session).as_ref().map(|s| s.identity.clone())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let previous = lock(&self.session).take();
        if let Some(previous) = previous {
            info!(uid = %previous.identity.uid, "signed out");
            self.bus.auth_changed(false);
        }
        Ok(())
    }

    async fn refresh_session(&self) -> AuthResult<()> {
        let mut session = lock(&self.session);
        let active = session.as_mut().ok_or(AuthError::NotSignedIn)?;
        active.last_refreshed = Instant::now();
        Ok(())
    }

    fn session_expired(&self) -> bool {
        self.idle_for()
            .map(|idle| idle > self.expiry_window)
            .unwrap_or(false)
    }
}
