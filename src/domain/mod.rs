//! Campaign content and its scoped contexts
//!
//! Each entity kind (locations, chapters, notes, NPCs, quests, rumors) is
//! managed by a `DomainContext`, which layers attribution, id derivation,
//! parent validation, cascading delete and change broadcast over a
//! `CollectionSync`.

mod attribution;
mod context;
mod entities;
mod entity;
mod error;
mod hierarchy;
mod kind;
mod slug;

pub use attribution::{Attribution, Author, CREATED_FIELDS};
pub use context::{ContextState, DomainContext};
pub use entities::{Chapter, Location, Note, Npc, Quest, QuestStatus, Rumor};
pub use entity::{Entity, PARENT_FIELD};
pub use error::{DomainError, DomainResult};
pub use hierarchy::{children, delete_order, descendants, resolve_parent, validate_parents};
pub use kind::EntityKind;
pub use slug::slugify;
