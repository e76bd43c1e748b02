//! Dual-storage synchronization.
//!
//! Every relationship field in a person note is stored twice: as a wikilink
//! (preferred by the host's link graph and rename tracking) and as a stable-id
//! field (resilient to renames the host cannot track). This module owns the
//! consistency between the two:
//!
//! - Read resolution is **id-first, wikilink-fallback**. When both are present
//!   and disagree, the id field is authoritative and the wikilink is stale,
//!   due for repair on the next write.
//! - Writes are emitted as field-level [`PatchSet`]s scoped to exactly the
//!   fields that changed. Running the synchronizer on an already-consistent
//!   record set produces no patches.
//! - Symmetric facts self-heal: a one-sided spouse reference produces a repair
//!   patch for the other record, and a children entry with no parent
//!   back-reference fills the child's parent field when the parent's sex
//!   determines the side.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::id::CrId;
use crate::model::{Person, Sex};
use crate::note::record::{fields, PersonRecord, RefField, RefListField};
use crate::note::wikilink::Wikilink;
use crate::note::PatchSet;
use crate::report::ParseReport;

/// Maps note names to stable ids and back. The host application's metadata
/// cache implements this in production; [`RecordIndex`] derives one from the
/// record set itself.
pub trait NoteIndex {
    fn id_for_note(&self, note_name: &str) -> Option<CrId>;
    fn note_name(&self, id: &CrId) -> Option<String>;
}

/// A person record paired with the note it came from.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub note: String,
    pub record: PersonRecord,
}

/// Note index derived from a record set.
#[derive(Debug, Default)]
pub struct RecordIndex {
    by_note: BTreeMap<String, CrId>,
    by_id: BTreeMap<CrId, String>,
}

impl RecordIndex {
    pub fn build(notes: &[NoteRecord]) -> Self {
        let mut index = RecordIndex::default();
        for entry in notes {
            if let Some(id) = &entry.record.cr_id {
                index
                    .by_note
                    .insert(normalize_note_name(&entry.note), id.clone());
                index.by_id.insert(id.clone(), entry.note.clone());
            }
        }
        index
    }
}

fn normalize_note_name(name: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    name.nfc().collect::<String>().to_lowercase()
}

impl NoteIndex for RecordIndex {
    fn id_for_note(&self, note_name: &str) -> Option<CrId> {
        self.by_note.get(&normalize_note_name(note_name)).cloned()
    }

    fn note_name(&self, id: &CrId) -> Option<String> {
        self.by_id.get(id).cloned()
    }
}

fn link_target(link: &str) -> Option<String> {
    Wikilink::parse(link).map(|l| l.target)
}

/// Resolve one dual-stored reference. Returns the authoritative id (if any)
/// and whether the wikilink half is stale.
fn resolve_ref(field: &RefField, index: &dyn NoteIndex) -> (Option<CrId>, bool) {
    match (&field.id, &field.link) {
        (Some(id), Some(link)) => {
            let stale = match link_target(link).and_then(|t| index.id_for_note(&t)) {
                Some(linked_id) => linked_id != *id,
                // Link target unknown to the index: broken by a rename.
                None => true,
            };
            (Some(id.clone()), stale)
        }
        (Some(id), None) => (Some(id.clone()), false),
        (None, Some(link)) => (
            link_target(link).and_then(|t| index.id_for_note(&t)),
            false,
        ),
        (None, None) => (None, false),
    }
}

/// Resolve a dual-stored reference list. Ids are authoritative and keep their
/// order; link-only entries append the ids they resolve to.
fn resolve_list(field: &RefListField, index: &dyn NoteIndex) -> Vec<CrId> {
    let mut ids = field.ids.clone();
    for link in &field.links {
        if let Some(id) = link_target(link).and_then(|t| index.id_for_note(&t)) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Resolve a record to a canonical [`Person`], id-first.
///
/// Records without a `cr_id` produce an error diagnostic and `None`;
/// relationship references that resolve nowhere produce warnings and are
/// skipped.
pub fn resolve_person(
    entry: &NoteRecord,
    index: &dyn NoteIndex,
    report: &mut ParseReport,
) -> Option<Person> {
    let record = &entry.record;
    let Some(cr_id) = record.cr_id.clone() else {
        report.error(&entry.note, "record has no cr_id");
        return None;
    };

    let mut person = Person::new(
        cr_id,
        record.name.clone().unwrap_or_else(|| entry.note.clone()),
    );
    person.sex = record.sex.unwrap_or_default();
    person.gender_identity = record.gender_identity.clone();
    person.pronouns = record.pronouns.clone();
    person.birth_date = record.birth_date.clone();
    person.death_date = record.death_date.clone();
    person.birth_place = record.birth_place.clone();
    person.death_place = record.death_place.clone();
    person.burial_place = record.burial_place.clone();
    person.occupation = record.occupation.clone();
    person.research_level = record.research_level.unwrap_or_default();

    let mut single = |field: &RefField, name: &str| -> Option<CrId> {
        let (id, _) = resolve_ref(field, index);
        if id.is_none() && !field.is_empty() {
            report.warning(
                &entry.note,
                format!("reference in \"{name}\" could not be resolved"),
            );
        }
        id
    };
    person.father = single(&record.father, fields::FATHER);
    person.mother = single(&record.mother, fields::MOTHER);
    person.adoptive_father = single(&record.adoptive_father, fields::ADOPTIVE_FATHER);
    person.adoptive_mother = single(&record.adoptive_mother, fields::ADOPTIVE_MOTHER);
    person.stepfathers = resolve_list(&record.stepfathers, index);
    person.stepmothers = resolve_list(&record.stepmothers, index);
    person.spouses = resolve_list(&record.spouses, index);
    person.children = resolve_list(&record.children, index);
    Some(person)
}

/// Resolved relationship state for one record during a repair pass.
#[derive(Debug, Clone, Default)]
struct Desired {
    father: Option<CrId>,
    mother: Option<CrId>,
    adoptive_father: Option<CrId>,
    adoptive_mother: Option<CrId>,
    stepfathers: Vec<CrId>,
    stepmothers: Vec<CrId>,
    spouses: Vec<CrId>,
    children: Vec<CrId>,
    sex: Sex,
}

impl Desired {
    fn parent_ids(&self) -> impl Iterator<Item = &CrId> {
        self.father
            .iter()
            .chain(self.mother.iter())
            .chain(self.adoptive_father.iter())
            .chain(self.adoptive_mother.iter())
            .chain(self.stepfathers.iter())
            .chain(self.stepmothers.iter())
    }
}

/// Plan repair patches for a record set.
///
/// Resolution is id-first per field; then symmetric facts are healed across
/// records; finally both storage representations are regenerated and diffed
/// against the current fields. Consistent input yields an empty map entry for
/// every note.
pub fn plan_repairs(
    notes: &[NoteRecord],
    index: &dyn NoteIndex,
    report: &mut ParseReport,
) -> BTreeMap<String, PatchSet> {
    // Resolve every record's authoritative ids.
    let mut desired: BTreeMap<CrId, Desired> = BTreeMap::new();
    let mut note_of: BTreeMap<CrId, &NoteRecord> = BTreeMap::new();
    for entry in notes {
        let Some(cr_id) = entry.record.cr_id.clone() else {
            continue;
        };
        let record = &entry.record;
        let state = Desired {
            father: resolve_ref(&record.father, index).0,
            mother: resolve_ref(&record.mother, index).0,
            adoptive_father: resolve_ref(&record.adoptive_father, index).0,
            adoptive_mother: resolve_ref(&record.adoptive_mother, index).0,
            stepfathers: resolve_list(&record.stepfathers, index),
            stepmothers: resolve_list(&record.stepmothers, index),
            spouses: resolve_list(&record.spouses, index),
            children: resolve_list(&record.children, index),
            sex: record.sex.unwrap_or_default(),
        };
        desired.insert(cr_id.clone(), state);
        note_of.insert(cr_id, entry);
    }

    heal_spouse_symmetry(&mut desired);
    heal_parent_child_mirror(&mut desired, report, &note_of);

    // Regenerate both representations and diff.
    let mut patches: BTreeMap<String, PatchSet> = BTreeMap::new();
    for entry in notes {
        let mut patch = PatchSet::new();
        let current = entry.record.to_fields();
        match &entry.record.cr_id {
            None => {
                // A record with no stable id gets one assigned.
                patch.set_if_changed(
                    &current,
                    fields::CR_ID,
                    Value::String(CrId::generate().as_str().to_owned()),
                );
            }
            Some(cr_id) => {
                let state = &desired[cr_id];
                diff_single(&mut patch, &current, index, fields::FATHER, fields::FATHER_ID, &state.father);
                diff_single(&mut patch, &current, index, fields::MOTHER, fields::MOTHER_ID, &state.mother);
                diff_single(
                    &mut patch,
                    &current,
                    index,
                    fields::ADOPTIVE_FATHER,
                    fields::ADOPTIVE_FATHER_ID,
                    &state.adoptive_father,
                );
                diff_single(
                    &mut patch,
                    &current,
                    index,
                    fields::ADOPTIVE_MOTHER,
                    fields::ADOPTIVE_MOTHER_ID,
                    &state.adoptive_mother,
                );
                diff_list(
                    &mut patch,
                    &current,
                    index,
                    fields::STEPFATHERS,
                    fields::STEPFATHER_IDS,
                    &state.stepfathers,
                );
                diff_list(
                    &mut patch,
                    &current,
                    index,
                    fields::STEPMOTHERS,
                    fields::STEPMOTHER_IDS,
                    &state.stepmothers,
                );
                diff_list(
                    &mut patch,
                    &current,
                    index,
                    fields::SPOUSES,
                    fields::SPOUSE_IDS,
                    &state.spouses,
                );
                diff_list(
                    &mut patch,
                    &current,
                    index,
                    fields::CHILDREN,
                    fields::CHILDREN_IDS,
                    &state.children,
                );
            }
        }
        if !patch.is_empty() {
            tracing::debug!(note = %entry.note, fields = patch.len(), "repair patch planned");
        }
        patches.insert(entry.note.clone(), patch);
    }
    patches
}

/// If A lists B as spouse, B lists A.
fn heal_spouse_symmetry(desired: &mut BTreeMap<CrId, Desired>) {
    let pairs: Vec<(CrId, CrId)> = desired
        .iter()
        .flat_map(|(a, state)| state.spouses.iter().map(move |b| (a.clone(), b.clone())))
        .collect();
    for (a, b) in pairs {
        if let Some(other) = desired.get_mut(&b) {
            if !other.spouses.contains(&a) {
                other.spouses.push(a);
            }
        }
    }
}

/// Parent references are authoritative: every resolved parent's children list
/// must contain the child. The reverse direction fills the child's parent
/// field when the parent's sex determines the side.
fn heal_parent_child_mirror(
    desired: &mut BTreeMap<CrId, Desired>,
    report: &mut ParseReport,
    note_of: &BTreeMap<CrId, &NoteRecord>,
) {
    // Forward: parent fields → children lists.
    let edges: Vec<(CrId, CrId)> = desired
        .iter()
        .flat_map(|(child, state)| {
            state
                .parent_ids()
                .map(move |parent| (parent.clone(), child.clone()))
        })
        .collect();
    for (parent, child) in edges {
        if let Some(parent_state) = desired.get_mut(&parent) {
            if !parent_state.children.contains(&child) {
                parent_state.children.push(child);
            }
        }
    }

    // Reverse: children entries without a parent back-reference.
    let claims: Vec<(CrId, Sex, CrId)> = desired
        .iter()
        .flat_map(|(parent, state)| {
            state
                .children
                .iter()
                .map(move |child| (parent.clone(), state.sex, child.clone()))
        })
        .collect();
    for (parent, sex, child) in claims {
        let Some(child_state) = desired.get_mut(&child) else {
            continue;
        };
        if child_state.parent_ids().any(|p| *p == parent) {
            continue;
        }
        let note = note_of
            .get(&parent)
            .map(|e| e.note.as_str())
            .unwrap_or("unknown");
        match sex {
            Sex::Male => match &child_state.father {
                None => child_state.father = Some(parent),
                Some(existing) if *existing != parent => report.warning(
                    note,
                    format!("child {child} already has father {existing}, cannot mirror {parent}"),
                ),
                Some(_) => {}
            },
            Sex::Female => match &child_state.mother {
                None => child_state.mother = Some(parent),
                Some(existing) if *existing != parent => report.warning(
                    note,
                    format!("child {child} already has mother {existing}, cannot mirror {parent}"),
                ),
                Some(_) => {}
            },
            Sex::Unknown => report.warning(
                note,
                format!("cannot mirror child {child}: parent {parent} has unknown sex"),
            ),
        }
    }
}

fn link_value(index: &dyn NoteIndex, id: &CrId, current: &BTreeMap<String, Value>, link_field: &str) -> Option<Value> {
    match index.note_name(id) {
        Some(name) => Some(Value::String(Wikilink::format(&name))),
        // No note name known: the wikilink half cannot be repaired, keep
        // whatever is currently stored.
        None => current.get(link_field).cloned(),
    }
}

fn diff_single(
    patch: &mut PatchSet,
    current: &BTreeMap<String, Value>,
    index: &dyn NoteIndex,
    link_field: &str,
    id_field: &str,
    desired: &Option<CrId>,
) {
    match desired {
        Some(id) => {
            patch.set_if_changed(current, id_field, Value::String(id.as_str().to_owned()));
            if let Some(link) = link_value(index, id, current, link_field) {
                patch.set_if_changed(current, link_field, link);
            }
        }
        None => {
            patch.remove_if_present(current, id_field);
            patch.remove_if_present(current, link_field);
        }
    }
}

fn diff_list(
    patch: &mut PatchSet,
    current: &BTreeMap<String, Value>,
    index: &dyn NoteIndex,
    link_field: &str,
    id_field: &str,
    desired: &[CrId],
) {
    if desired.is_empty() {
        patch.remove_if_present(current, id_field);
        patch.remove_if_present(current, link_field);
        return;
    }
    let ids = Value::Array(
        desired
            .iter()
            .map(|i| Value::String(i.as_str().to_owned()))
            .collect(),
    );
    patch.set_if_changed(current, id_field, ids);

    let links: Vec<Value> = desired
        .iter()
        .filter_map(|i| link_value(index, i, current, link_field))
        .flat_map(|v| match v {
            Value::Array(items) => items,
            other => vec![other],
        })
        .collect();
    if links.len() == desired.len() {
        patch.set_if_changed(current, link_field, Value::Array(links));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::patch::PatchOp;
    use serde_json::json;

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    fn note(name: &str, pairs: &[(&str, Value)]) -> NoteRecord {
        let map: BTreeMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        NoteRecord {
            note: name.to_owned(),
            record: PersonRecord::from_fields(&map),
        }
    }

    #[test]
    fn id_wins_over_disagreeing_wikilink() {
        let notes = vec![
            note("Child", &[
                ("cr_id", json!("c01")),
                ("father", json!("[[Wrong Person]]")),
                ("father_id", json!("f01")),
            ]),
            note("Right Person", &[("cr_id", json!("f01")), ("sex", json!("M"))]),
            note("Wrong Person", &[("cr_id", json!("w01")), ("sex", json!("M"))]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let person = resolve_person(&notes[0], &index, &mut report).unwrap();
        assert_eq!(person.father, Some(id("f01")));
    }

    #[test]
    fn wikilink_fallback_when_id_missing() {
        let notes = vec![
            note("Child", &[
                ("cr_id", json!("c01")),
                ("mother", json!("[[Jane Doe]]")),
            ]),
            note("Jane Doe", &[("cr_id", json!("m01"))]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let person = resolve_person(&notes[0], &index, &mut report).unwrap();
        assert_eq!(person.mother, Some(id("m01")));
    }

    #[test]
    fn stale_wikilink_repaired_on_write() {
        let notes = vec![
            note("Child", &[
                ("cr_id", json!("c01")),
                ("father", json!("[[Old Name]]")),
                ("father_id", json!("f01")),
            ]),
            note("New Name", &[("cr_id", json!("f01")), ("sex", json!("M"))]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let patches = plan_repairs(&notes, &index, &mut report);
        let child_patch = &patches["Child"];
        assert!(child_patch
            .patches
            .iter()
            .any(|p| p.field == "father" && p.op == PatchOp::Set(json!("[[New Name]]"))));
    }

    #[test]
    fn one_sided_spouse_is_self_healing() {
        // The spec scenario: A has spouse_id [X], X lists nothing.
        let notes = vec![
            note("A", &[("cr_id", json!("a01")), ("spouse_id", json!(["x01"]))]),
            note("X", &[("cr_id", json!("x01"))]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let patches = plan_repairs(&notes, &index, &mut report);
        let x_patch = &patches["X"];
        assert!(x_patch
            .patches
            .iter()
            .any(|p| p.field == "spouse_id" && p.op == PatchOp::Set(json!(["a01"]))));
    }

    #[test]
    fn consistent_records_produce_no_writes() {
        let notes = vec![
            note("Father", &[
                ("cr_id", json!("f01")),
                ("sex", json!("M")),
                ("children", json!(["[[Child]]"])),
                ("children_id", json!(["c01"])),
            ]),
            note("Child", &[
                ("cr_id", json!("c01")),
                ("father", json!("[[Father]]")),
                ("father_id", json!("f01")),
            ]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let patches = plan_repairs(&notes, &index, &mut report);
        assert!(patches.values().all(|p| p.is_empty()), "{patches:?}");

        // Idempotence: a second run still plans nothing.
        let again = plan_repairs(&notes, &index, &mut report);
        assert!(again.values().all(|p| p.is_empty()));
    }

    #[test]
    fn parent_reference_fills_parent_children_list() {
        let notes = vec![
            note("Father", &[("cr_id", json!("f01")), ("sex", json!("M"))]),
            note("Child", &[
                ("cr_id", json!("c01")),
                ("father_id", json!("f01")),
            ]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let patches = plan_repairs(&notes, &index, &mut report);
        let father_patch = &patches["Father"];
        assert!(father_patch
            .patches
            .iter()
            .any(|p| p.field == "children_id" && p.op == PatchOp::Set(json!(["c01"]))));
    }

    #[test]
    fn children_entry_fills_child_parent_by_sex() {
        let notes = vec![
            note("Mother", &[
                ("cr_id", json!("m01")),
                ("sex", json!("F")),
                ("children_id", json!(["c01"])),
            ]),
            note("Child", &[("cr_id", json!("c01"))]),
        ];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let patches = plan_repairs(&notes, &index, &mut report);
        let child_patch = &patches["Child"];
        assert!(child_patch
            .patches
            .iter()
            .any(|p| p.field == "mother_id" && p.op == PatchOp::Set(json!("m01"))));
    }

    #[test]
    fn record_without_id_gets_one_assigned() {
        let notes = vec![note("Nobody", &[("name", json!("Nobody"))])];
        let index = RecordIndex::build(&notes);
        let mut report = ParseReport::new();
        let patches = plan_repairs(&notes, &index, &mut report);
        let patch = &patches["Nobody"];
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.patches[0].field, "cr_id");
    }
}
