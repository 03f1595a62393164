//! Partial updates

use crate::store::Document;
use serde_json::Value;

/// A set of top-level field assignments applied with a shallow merge.
///
/// Setting a field to `null` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Document,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `field`
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set `field` to `null`
    pub fn clear(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), Value::Null);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_document(self) -> Document {
        self.fields
    }
}

impl From<Document> for Patch {
    fn from(fields: Document) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_and_clears() {
        let patch = Patch::new()
            .set("name", "Dale")
            .set("tags", vec!["town"])
            .set("population", 2_000)
            .clear("parentId");

        assert_eq!(patch.get("name"), Some(&json!("Dale")));
        assert_eq!(patch.get("tags"), Some(&json!(["town"])));
        assert_eq!(patch.get("population"), Some(&json!(2_000)));
        assert_eq!(patch.get("parentId"), Some(&Value::Null));
        assert!(!patch.contains("description"));
    }
}
