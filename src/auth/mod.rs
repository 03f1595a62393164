//! Authentication collaborator
//!
//! The core only needs the current identity, sign-out, session refresh and
//! an expiry check. `LocalAuth` is an in-process implementation with a
//! sliding expiry window.

mod local;
mod traits;

pub use local::LocalAuth;
pub use traits::{AuthError, AuthResult, AuthService, Identity};
