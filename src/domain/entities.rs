//! Campaign content records

use super::attribution::Attribution;
use super::entity::Entity;
use super::kind::EntityKind;
use crate::sync::Record;
use serde::{Deserialize, Serialize};

macro_rules! impl_record {
    ($ty:ty) => {
        impl Record for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

macro_rules! attribution_accessors {
    () => {
        fn attribution(&self) -> &Attribution {
            &self.attribution
        }

        fn attribution_mut(&mut self) -> &mut Attribution {
            &mut self.attribution
        }
    };
}

/// A place in the campaign world. Locations nest through `parent_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl_record!(Location);

impl Entity for Location {
    const KIND: EntityKind = EntityKind::Location;
    const NATURAL_KEY: bool = true;
    const HIERARCHICAL: bool = true;

    fn display_name(&self) -> &str {
        &self.name
    }

    attribution_accessors!();

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn set_parent_id(&mut self, parent_id: Option<String>) {
        self.parent_id = parent_id;
    }
}

/// A story chapter, ordered within the campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order: u32,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl Chapter {
    pub fn new(title: impl Into<String>, order: u32) -> Self {
        Self {
            title: title.into(),
            order,
            ..Default::default()
        }
    }
}

impl_record!(Chapter);

impl Entity for Chapter {
    const KIND: EntityKind = EntityKind::Chapter;
    const NATURAL_KEY: bool = true;

    fn display_name(&self) -> &str {
        &self.title
    }

    attribution_accessors!();
}

/// A free-form campaign note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

impl_record!(Note);

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;
    const NATURAL_KEY: bool = false;

    fn display_name(&self) -> &str {
        &self.title
    }

    attribution_accessors!();
}

/// A non-player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default = "default_alive")]
    pub alive: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

fn default_alive() -> bool {
    true
}

impl Npc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            race: None,
            occupation: None,
            description: String::new(),
            location_id: None,
            alive: true,
            attribution: Attribution::default(),
        }
    }
}

impl_record!(Npc);

impl Entity for Npc {
    const KIND: EntityKind = EntityKind::Npc;
    const NATURAL_KEY: bool = true;

    fn display_name(&self) -> &str {
        &self.name
    }

    attribution_accessors!();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestStatus {
    #[default]
    Active,
    Completed,
    Failed,
    OnHold,
}

/// A quest the party can take on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: QuestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub giver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl Quest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

impl_record!(Quest);

impl Entity for Quest {
    const KIND: EntityKind = EntityKind::Quest;
    const NATURAL_KEY: bool = true;

    fn display_name(&self) -> &str {
        &self.title
    }

    attribution_accessors!();
}

/// Hearsay picked up during play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rumor {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl Rumor {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

impl_record!(Rumor);

impl Entity for Rumor {
    const KIND: EntityKind = EntityKind::Rumor;
    const NATURAL_KEY: bool = false;

    fn display_name(&self) -> &str {
        &self.title
    }

    attribution_accessors!();
}
