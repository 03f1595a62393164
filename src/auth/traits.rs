//! Authentication trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id
    pub uid: String,
    /// Account display name
    pub username: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("auth provider error: {0}")]
    Provider(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Contract for the authentication service.
///
/// Implementations publish `Signal::AuthChanged` on the invalidation bus
/// exactly once per sign-in and once per sign-out.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// The signed-in identity, if any
    fn current_identity(&self) -> Option<Identity>;

    /// End the session
    async fn sign_out(&self) -> AuthResult<()>;

    /// Push the session expiry forward
    async fn refresh_session(&self) -> AuthResult<()>;

    /// True once the time since the last refresh exceeds the expiry window.
    /// Always false when nobody is signed in.
    fn session_expired(&self) -> bool;
}
