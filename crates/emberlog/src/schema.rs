//! Field schema: ordered field names with an indexed subset.
//!
//! The record format carries no field names; a field's position in the
//! encoded record is implied by its position in the schema. The schema is
//! fixed for the lifetime of the store.

use std::collections::HashMap;

/// Ordered field names plus the subset of fields that are indexed.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<String>,
    indexed: Vec<bool>,
    positions: HashMap<String, usize>,
}

impl FieldSchema {
    /// Creates a schema from ordered field names and the names to index.
    ///
    /// Indexed names that do not appear in `field_names` are ignored.
    pub fn new<S: AsRef<str>>(field_names: &[S], indexed_names: &[S]) -> Self {
        let fields: Vec<String> = field_names.iter().map(|s| s.as_ref().to_string()).collect();
        let indexed = fields
            .iter()
            .map(|f| indexed_names.iter().any(|i| i.as_ref() == f))
            .collect();
        let positions = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.clone(), i))
            .collect();
        Self {
            fields,
            indexed,
            positions,
        }
    }

    /// Number of fields in the schema.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of the field at `position`, if any.
    pub fn field_name(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(String::as_str)
    }

    /// Position of the named field, if it is in the schema.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Returns true if the field at `position` is indexed.
    pub fn is_indexed(&self, position: usize) -> bool {
        self.indexed.get(position).copied().unwrap_or(false)
    }

    /// Positions of all indexed fields, in schema order.
    pub fn indexed_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.indexed
            .iter()
            .enumerate()
            .filter_map(|(i, idx)| idx.then_some(i))
    }
}
