//! Session lifecycle
//!
//! Derives "still active" from raw input events: activity refreshes the
//! session at most once per throttle interval, and a periodic check signs
//! out once the session has expired.

mod activity;
mod manager;

pub use activity::ActivityKind;
pub use manager::{ActivityOutcome, ExpiryOutcome, SessionManager};
