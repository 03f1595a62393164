//! Entity kinds and their collections

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of campaign content, one collection each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Location,
    Chapter,
    Note,
    Npc,
    Quest,
    Rumor,
}

impl EntityKind {
    /// Collection name under a campaign
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::Location => "locations",
            Self::Chapter => "chapters",
            Self::Note => "notes",
            Self::Npc => "npcs",
            Self::Quest => "quests",
            Self::Rumor => "rumors",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Location => "location",
            Self::Chapter => "chapter",
            Self::Note => "note",
            Self::Npc => "npc",
            Self::Quest => "quest",
            Self::Rumor => "rumor",
        };
        f.write_str(name)
    }
}
