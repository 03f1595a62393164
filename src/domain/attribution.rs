//! Attribution stamps

use crate::auth::Identity;
use crate::sync::Patch;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Fields that are written once, at creation, and never patched.
pub const CREATED_FIELDS: [&str; 4] = [
    "createdBy",
    "createdByUsername",
    "createdByCharacterName",
    "dateAdded",
];

/// Who created and who last modified a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attribution {
    pub created_by: String,
    pub created_by_username: String,
    pub created_by_character_name: String,
    pub date_added: Option<DateTime<Utc>>,
    pub modified_by: String,
    pub modified_by_username: String,
    pub modified_by_character_name: String,
    pub date_modified: Option<DateTime<Utc>>,
}

/// The writer behind a mutation, resolved from the signed-in identity and
/// the tenant's active character name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub uid: String,
    pub username: String,
    /// Active character name when one is set, else the username
    pub display_name: String,
}

impl Author {
    pub fn new(identity: &Identity, character_name: Option<&str>) -> Self {
        let display_name = character_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&identity.username)
            .to_string();
        Self {
            uid: identity.uid.clone(),
            username: identity.username.clone(),
            display_name,
        }
    }
}

impl Attribution {
    /// A creation stamp: the modified fields mirror the created fields.
    pub fn created(author: &Author, at: DateTime<Utc>) -> Self {
        Self {
            created_by: author.uid.clone(),
            created_by_username: author.username.clone(),
            created_by_character_name: author.display_name.clone(),
            date_added: Some(at),
            modified_by: author.uid.clone(),
            modified_by_username: author.username.clone(),
            modified_by_character_name: author.display_name.clone(),
            date_modified: Some(at),
        }
    }

    /// The modified fields as patch assignments
    pub fn modified_patch(author: &Author, at: DateTime<Utc>) -> Patch {
        Patch::new()
            .set("modifiedBy", author.uid.as_str())
            .set("modifiedByUsername", author.username.as_str())
            .set("modifiedByCharacterName", author.display_name.as_str())
            .set("dateModified", at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Drop any created-field assignments from `patch`
    pub fn strip_created(patch: &mut Patch) {
        for field in CREATED_FIELDS {
            patch.remove(field);
        }
    }
}
