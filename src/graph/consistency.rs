//! Mirror-invariant checking.
//!
//! Relationship references are directional facts that must be mirrored: a
//! parent→child edge is only valid if the child's parent reference is matched
//! by the parent's children list, and a spouse link must be symmetric.
//! Violations are detected when the graph cache is built (traversal/export
//! time, not resolution time); the affected edge is dropped from derived
//! output and logged, and the operation continues.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::id::CrId;
use crate::model::Person;

/// What kind of mirror was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    /// Child references a parent whose children list does not contain it.
    ParentNotMirrored,
    /// Parent reference points at a cr_id with no record.
    ParentMissing,
    /// Spouse reference is one-sided.
    SpouseNotMirrored,
    /// Spouse reference points at a cr_id with no record.
    SpouseMissing,
}

/// One dropped edge, for summaries and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorViolation {
    pub kind: ViolationKind,
    /// The person holding the reference.
    pub from: CrId,
    /// The referenced person.
    pub to: CrId,
    /// Field the reference came from (`father`, `spouses`, ...).
    pub field: &'static str,
}

/// Check a single parent reference's mirror.
pub fn parent_mirrored(persons: &BTreeMap<CrId, Person>, child: &CrId, parent: &CrId) -> bool {
    persons
        .get(parent)
        .is_some_and(|p| p.children.contains(child))
}

/// Scan the whole person set for mirror violations.
///
/// Used when the graph cache is rebuilt; each violation corresponds to an edge
/// that will be left out of the cache.
pub fn scan(persons: &BTreeMap<CrId, Person>) -> Vec<MirrorViolation> {
    let mut violations = Vec::new();

    for person in persons.values() {
        let parent_fields: [(&Option<CrId>, &'static str); 4] = [
            (&person.father, "father"),
            (&person.mother, "mother"),
            (&person.adoptive_father, "adoptive_father"),
            (&person.adoptive_mother, "adoptive_mother"),
        ];
        for (slot, field) in parent_fields {
            if let Some(parent) = slot {
                record_parent_violation(persons, person, parent, field, &mut violations);
            }
        }
        for parent in person.stepfathers.iter().chain(person.stepmothers.iter()) {
            record_parent_violation(persons, person, parent, "step_parents", &mut violations);
        }

        for spouse_id in &person.spouses {
            match persons.get(spouse_id) {
                None => violations.push(MirrorViolation {
                    kind: ViolationKind::SpouseMissing,
                    from: person.cr_id.clone(),
                    to: spouse_id.clone(),
                    field: "spouses",
                }),
                Some(spouse) if !spouse.spouses.contains(&person.cr_id) => {
                    violations.push(MirrorViolation {
                        kind: ViolationKind::SpouseNotMirrored,
                        from: person.cr_id.clone(),
                        to: spouse_id.clone(),
                        field: "spouses",
                    })
                }
                Some(_) => {}
            }
        }
    }

    for v in &violations {
        tracing::warn!(from = %v.from, to = %v.to, field = v.field, "mirror violation, edge dropped");
    }
    violations
}

fn record_parent_violation(
    persons: &BTreeMap<CrId, Person>,
    child: &Person,
    parent: &CrId,
    field: &'static str,
    violations: &mut Vec<MirrorViolation>,
) {
    let kind = match persons.get(parent) {
        None => ViolationKind::ParentMissing,
        Some(p) if !p.children.contains(&child.cr_id) => ViolationKind::ParentNotMirrored,
        Some(_) => return,
    };
    violations.push(MirrorViolation {
        kind,
        from: child.cr_id.clone(),
        to: parent.clone(),
        field,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    fn into_map(people: Vec<Person>) -> BTreeMap<CrId, Person> {
        people.into_iter().map(|p| (p.cr_id.clone(), p)).collect()
    }

    #[test]
    fn mirrored_graph_is_clean() {
        let mut f = Person::new(id("f"), "F");
        let mut c = Person::new(id("c"), "C");
        c.father = Some(id("f"));
        f.children = vec![id("c")];
        assert!(scan(&into_map(vec![f, c])).is_empty());
    }

    #[test]
    fn detects_unmirrored_parent() {
        let f = Person::new(id("f"), "F");
        let mut c = Person::new(id("c"), "C");
        c.father = Some(id("f"));
        let violations = scan(&into_map(vec![f, c]));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ParentNotMirrored);
        assert_eq!(violations[0].field, "father");
    }

    #[test]
    fn detects_one_sided_spouse() {
        let mut a = Person::new(id("a"), "A");
        let b = Person::new(id("b"), "B");
        a.spouses = vec![id("b")];
        let violations = scan(&into_map(vec![a, b]));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::SpouseNotMirrored);
    }

    #[test]
    fn detects_dangling_references() {
        let mut c = Person::new(id("c"), "C");
        c.mother = Some(id("ghost"));
        let violations = scan(&into_map(vec![c]));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ParentMissing);
    }
}
