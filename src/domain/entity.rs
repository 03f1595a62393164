//! The domain entity contract

use super::attribution::Attribution;
use super::kind::EntityKind;
use crate::sync::Record;

/// Wire name of the hierarchical parent reference.
pub const PARENT_FIELD: &str = "parentId";

/// A kind of campaign content managed by a `DomainContext`.
pub trait Entity: Record {
    const KIND: EntityKind;

    /// Ids derive from the display name instead of being random
    const NATURAL_KEY: bool;

    /// Records may name a parent of the same kind
    const HIERARCHICAL: bool = false;

    fn display_name(&self) -> &str;

    fn attribution(&self) -> &Attribution;

    fn attribution_mut(&mut self) -> &mut Attribution;

    fn parent_id(&self) -> Option<&str> {
        None
    }

    fn set_parent_id(&mut self, _parent_id: Option<String>) {}
}
