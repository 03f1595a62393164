//! User input that counts as activity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A raw input event that keeps a session alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    PointerDown,
    KeyDown,
    TouchStart,
    Scroll,
    PointerMove,
    Click,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::PointerDown,
        ActivityKind::KeyDown,
        ActivityKind::TouchStart,
        ActivityKind::Scroll,
        ActivityKind::PointerMove,
        ActivityKind::Click,
    ];

    /// DOM-style event name
    pub fn event_name(&self) -> &'static str {
        match self {
            ActivityKind::PointerDown => "pointerdown",
            ActivityKind::KeyDown => "keydown",
            ActivityKind::TouchStart => "touchstart",
            ActivityKind::Scroll => "scroll",
            ActivityKind::PointerMove => "pointermove",
            ActivityKind::Click => "click",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.event_name() == s)
            .ok_or_else(|| format!("unknown activity event: {s}"))
    }
}
