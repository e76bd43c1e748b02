//! Field-level patch instructions for note frontmatter.
//!
//! The synchronizer never rewrites whole records: it emits patches scoped to
//! the fields that actually changed. An already-consistent record produces an
//! empty patch set, which is the synchronizer's idempotence guarantee.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What to do with one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchOp {
    Set(Value),
    Remove,
}

/// A change to a single frontmatter field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub field: String,
    pub op: PatchOp,
}

/// All changes for one note, in field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    pub patches: Vec<FieldPatch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `Set`, unless the field already holds this exact value.
    pub fn set_if_changed(
        &mut self,
        current: &BTreeMap<String, Value>,
        field: &str,
        value: Value,
    ) {
        if current.get(field) != Some(&value) {
            self.patches.push(FieldPatch {
                field: field.to_owned(),
                op: PatchOp::Set(value),
            });
        }
    }

    /// Record a `Remove`, unless the field is already absent.
    pub fn remove_if_present(&mut self, current: &BTreeMap<String, Value>, field: &str) {
        if current.contains_key(field) {
            self.patches.push(FieldPatch {
                field: field.to_owned(),
                op: PatchOp::Remove,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Apply to a field map. Only the named fields are touched.
    pub fn apply(&self, fields: &mut BTreeMap<String, Value>) {
        for patch in &self.patches {
            match &patch.op {
                PatchOp::Set(value) => {
                    fields.insert(patch.field.clone(), value.clone());
                }
                PatchOp::Remove => {
                    fields.remove(&patch.field);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_skips_unchanged_values() {
        let mut current = BTreeMap::new();
        current.insert("father_id".to_owned(), json!("f01"));

        let mut patch = PatchSet::new();
        patch.set_if_changed(&current, "father_id", json!("f01"));
        assert!(patch.is_empty());

        patch.set_if_changed(&current, "father_id", json!("f02"));
        assert_eq!(patch.len(), 1);
    }

    #[test]
    fn remove_skips_absent_fields() {
        let current = BTreeMap::new();
        let mut patch = PatchSet::new();
        patch.remove_if_present(&current, "mother_id");
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_touches_only_named_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_owned(), json!("Ada"));
        fields.insert("custom_field".to_owned(), json!("untouched"));
        fields.insert("stale".to_owned(), json!(true));

        let patch = PatchSet {
            patches: vec![
                FieldPatch {
                    field: "father_id".into(),
                    op: PatchOp::Set(json!("f01")),
                },
                FieldPatch {
                    field: "stale".into(),
                    op: PatchOp::Remove,
                },
            ],
        };
        patch.apply(&mut fields);

        assert_eq!(fields["father_id"], json!("f01"));
        assert_eq!(fields["custom_field"], json!("untouched"));
        assert_eq!(fields["name"], json!("Ada"));
        assert!(!fields.contains_key("stale"));
    }
}
