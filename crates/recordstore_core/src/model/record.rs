//! Generic record representation.
//!
//! # Responsibility
//! - Carry one entity instance as an id, an entity name, and a field map.
//! - Provide field accessors for callers and the fetch merge path.
//!
//! # Invariants
//! - `id` is assigned at creation and never changes.
//! - A field absent from the map is NULL in storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier for every stored record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RecordId = Uuid;

/// Equality filter: field name to required value, all pairs ANDed.
/// An empty map matches every record.
pub type FieldFilter = BTreeMap<String, String>;

/// One instance of a schema entity.
///
/// Records are handles into their owning store context: they are
/// created by `add`, read back by fetches, and written back through
/// `update`. A record is only meaningful while its context is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    entity: String,
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Creates an empty record with a fresh id. Store-internal; callers
    /// go through the context's `insert`.
    pub(crate) fn new(entity: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity: entity.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Rebuilds a record from storage. Store-internal.
    pub(crate) fn from_parts(
        id: RecordId,
        entity: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            entity: entity.into(),
            fields,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Name of the entity this record belongs to.
    pub fn entity_type(&self) -> &str {
        &self.entity
    }

    /// Returns the value of `field`, or `None` when unset.
    pub fn field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Sets `field` to `value`. Validation against the schema happens
    /// when the record is staged through `update`.
    pub fn set_field(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Unsets `field` (NULL in storage), returning the previous value.
    pub fn clear_field(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    /// All set fields, in name order.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::Record;

    #[test]
    fn set_and_clear_fields_roundtrip() {
        let mut record = Record::new("Person");
        assert_eq!(record.field("name"), None);

        record.set_field("name", "Ada");
        assert_eq!(record.field("name"), Some("Ada"));

        assert_eq!(record.clear_field("name"), Some("Ada".to_string()));
        assert_eq!(record.field("name"), None);
    }

    #[test]
    fn new_records_get_distinct_ids() {
        let a = Record::new("Person");
        let b = Record::new("Person");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.entity_type(), "Person");
    }
}
