//! Family synthesis: the inverse of relationship resolution.
//!
//! Walks the person set and re-derives family records in three independent
//! grouping passes — biological, step, adoptive — because the target formats
//! carry one qualifier pair per child per family record; collapsing the three
//! classes into one family per parent pair would silently lose qualifiers.
//!
//! The passes are deterministic: groupings are keyed and ordered by parent id
//! pair, and persons are visited in id order, so the same graph always yields
//! the same family list.

use std::collections::{BTreeMap, HashSet};

use crate::id::CrId;
use crate::model::{ChildLink, FamilyView, MarriageFact, Pedigree, Person};
use crate::report::Diagnostic;

/// Outcome of a synthesis pass over the person set.
#[derive(Debug, Clone, Default)]
pub struct FamilySynthesis {
    pub families: Vec<FamilyView>,
    /// Dropped unmirrored edges and dangling references. The synthesis always
    /// completes; these are for the export summary.
    pub warnings: Vec<Diagnostic>,
}

/// Grouping class, part of the family key so the three passes stay disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Biological,
    Step,
    Adoptive,
}

type FamilyKey = (Class, String, String);

fn key_part(id: Option<&CrId>) -> String {
    id.map(|i| i.as_str().to_owned()).unwrap_or_default()
}

/// Synthesize the family view set from a resolved person set.
pub fn synthesize_families(persons: &BTreeMap<CrId, Person>) -> FamilySynthesis {
    let mut out = FamilySynthesis::default();
    let mut groups: BTreeMap<FamilyKey, FamilyView> = BTreeMap::new();
    // Single-parent birth edges already represented inside a step family;
    // suppresses the spurious one-parent biological family for those children.
    let mut represented: HashSet<(CrId, CrId)> = HashSet::new();

    for person in persons.values() {
        collect_step_families(person, persons, &mut groups, &mut represented, &mut out);
    }
    for person in persons.values() {
        collect_adoptive_family(person, persons, &mut groups, &mut represented, &mut out);
    }
    for person in persons.values() {
        collect_biological_family(person, persons, &mut groups, &represented, &mut out);
    }
    collect_childless_couples(persons, &mut groups);

    for family in groups.values_mut() {
        attach_marriage(family, persons);
    }

    out.families = groups.into_values().collect();
    out
}

/// Validate a parent reference: the parent must exist and the parent→child
/// edge must be mirrored by the parent's children list. Unmirrored edges are
/// dropped from derived output, never emitted.
fn checked_parent<'a>(
    child: &Person,
    parent_id: &CrId,
    persons: &'a BTreeMap<CrId, Person>,
    out: &mut FamilySynthesis,
) -> Option<&'a Person> {
    let Some(parent) = persons.get(parent_id) else {
        out.warnings.push(Diagnostic::warning(
            child.cr_id.as_str(),
            format!("parent reference {parent_id} points outside the graph, edge dropped"),
        ));
        return None;
    };
    if !parent.children.contains(&child.cr_id) {
        tracing::warn!(
            child = %child.cr_id,
            parent = %parent_id,
            "unmirrored parent-child edge dropped from export"
        );
        out.warnings.push(Diagnostic::warning(
            child.cr_id.as_str(),
            format!("parent {parent_id} does not list this child back, edge dropped"),
        ));
        return None;
    }
    Some(parent)
}

/// Symmetric spouse check; one-sided spouse references never form a couple.
fn are_spouses(a: &Person, b: &Person) -> bool {
    a.spouses.contains(&b.cr_id) && b.spouses.contains(&a.cr_id)
}

fn push_child(family: &mut FamilyView, link: ChildLink) {
    if !family.children.iter().any(|c| c.child == link.child) {
        family.children.push(link);
    }
}

/// Step pass: one family per distinct step-parent, father-side and mother-side
/// kept separate. When the step-parent is married to the child's birth parent
/// on the opposite side, that birth parent completes the couple and the child
/// carries `Birth` on that side — one childref, two qualifiers.
fn collect_step_families(
    person: &Person,
    persons: &BTreeMap<CrId, Person>,
    groups: &mut BTreeMap<FamilyKey, FamilyView>,
    represented: &mut HashSet<(CrId, CrId)>,
    out: &mut FamilySynthesis,
) {
    for step_id in &person.stepfathers {
        let Some(step) = checked_parent(person, step_id, persons, out) else {
            continue;
        };
        let complement = person
            .mother
            .as_ref()
            .and_then(|m| persons.get(m))
            .filter(|m| are_spouses(step, m))
            .map(|m| m.cr_id.clone());
        if let Some(mother) = &complement {
            represented.insert((person.cr_id.clone(), mother.clone()));
        }
        let key = (
            Class::Step,
            step_id.as_str().to_owned(),
            key_part(complement.as_ref()),
        );
        let family = groups
            .entry(key)
            .or_insert_with(|| FamilyView::new(Some(step_id.clone()), complement.clone()));
        push_child(
            family,
            ChildLink {
                child: person.cr_id.clone(),
                father_rel: Pedigree::Stepchild,
                mother_rel: Pedigree::Birth,
            },
        );
    }

    for step_id in &person.stepmothers {
        let Some(step) = checked_parent(person, step_id, persons, out) else {
            continue;
        };
        let complement = person
            .father
            .as_ref()
            .and_then(|f| persons.get(f))
            .filter(|f| are_spouses(step, f))
            .map(|f| f.cr_id.clone());
        if let Some(father) = &complement {
            represented.insert((person.cr_id.clone(), father.clone()));
        }
        let key = (
            Class::Step,
            key_part(complement.as_ref()),
            step_id.as_str().to_owned(),
        );
        let family = groups
            .entry(key)
            .or_insert_with(|| FamilyView::new(complement.clone(), Some(step_id.clone())));
        push_child(
            family,
            ChildLink {
                child: person.cr_id.clone(),
                father_rel: Pedigree::Birth,
                mother_rel: Pedigree::Stepchild,
            },
        );
    }
}

/// Adoptive pass: keyed by the (adoptive-father, adoptive-mother) pair. A
/// single adoptive parent married to the child's birth parent on the opposite
/// side gets that birth parent as the couple's other half — one family, the
/// child qualified `Adopted` on one side and `Birth` on the other.
fn collect_adoptive_family(
    person: &Person,
    persons: &BTreeMap<CrId, Person>,
    groups: &mut BTreeMap<FamilyKey, FamilyView>,
    represented: &mut HashSet<(CrId, CrId)>,
    out: &mut FamilySynthesis,
) {
    let mut father = person
        .adoptive_father
        .as_ref()
        .and_then(|f| checked_parent(person, f, persons, out))
        .map(|p| p.cr_id.clone());
    let mut mother = person
        .adoptive_mother
        .as_ref()
        .and_then(|m| checked_parent(person, m, persons, out))
        .map(|p| p.cr_id.clone());
    if father.is_none() && mother.is_none() {
        return;
    }
    let mut father_rel = if father.is_some() {
        Pedigree::Adopted
    } else {
        Pedigree::Birth
    };
    let mut mother_rel = if mother.is_some() {
        Pedigree::Adopted
    } else {
        Pedigree::Birth
    };

    if let (Some(af), None) = (father.clone(), mother.clone()) {
        let complement = person
            .mother
            .as_ref()
            .and_then(|m| persons.get(m))
            .filter(|m| persons.get(&af).is_some_and(|a| are_spouses(a, m)))
            .map(|m| m.cr_id.clone());
        if let Some(m) = complement {
            represented.insert((person.cr_id.clone(), m.clone()));
            mother = Some(m);
            mother_rel = Pedigree::Birth;
        }
    } else if let (None, Some(am)) = (father.clone(), mother.clone()) {
        let complement = person
            .father
            .as_ref()
            .and_then(|f| persons.get(f))
            .filter(|f| persons.get(&am).is_some_and(|a| are_spouses(a, f)))
            .map(|f| f.cr_id.clone());
        if let Some(f) = complement {
            represented.insert((person.cr_id.clone(), f.clone()));
            father = Some(f);
            father_rel = Pedigree::Birth;
        }
    }

    let key = (
        Class::Adoptive,
        key_part(father.as_ref()),
        key_part(mother.as_ref()),
    );
    let family = groups
        .entry(key)
        .or_insert_with(|| FamilyView::new(father.clone(), mother.clone()));
    push_child(
        family,
        ChildLink {
            child: person.cr_id.clone(),
            father_rel,
            mother_rel,
        },
    );
}

/// Biological pass: keyed by the (father, mother) pair. A one-parent family is
/// suppressed when its single birth edge already appears inside a step family.
fn collect_biological_family(
    person: &Person,
    persons: &BTreeMap<CrId, Person>,
    groups: &mut BTreeMap<FamilyKey, FamilyView>,
    represented: &HashSet<(CrId, CrId)>,
    out: &mut FamilySynthesis,
) {
    let father = person
        .father
        .as_ref()
        .and_then(|f| checked_parent(person, f, persons, out))
        .map(|p| p.cr_id.clone());
    let mother = person
        .mother
        .as_ref()
        .and_then(|m| checked_parent(person, m, persons, out))
        .map(|p| p.cr_id.clone());

    let (father, mother) = match (father, mother) {
        (None, None) => return,
        (Some(f), None) if represented.contains(&(person.cr_id.clone(), f.clone())) => return,
        (None, Some(m)) if represented.contains(&(person.cr_id.clone(), m.clone())) => return,
        pair => pair,
    };

    let key = (
        Class::Biological,
        key_part(father.as_ref()),
        key_part(mother.as_ref()),
    );
    let family = groups
        .entry(key)
        .or_insert_with(|| FamilyView::new(father.clone(), mother.clone()));
    push_child(family, ChildLink::birth(person.cr_id.clone()));
}

/// Married couples with no shared children still form a family record;
/// without one the spouse link would be lost on export.
fn collect_childless_couples(
    persons: &BTreeMap<CrId, Person>,
    groups: &mut BTreeMap<FamilyKey, FamilyView>,
) {
    for person in persons.values() {
        for spouse_id in &person.spouses {
            let Some(spouse) = persons.get(spouse_id) else {
                continue;
            };
            // Visit each symmetric pair once.
            if !are_spouses(person, spouse) || person.cr_id >= spouse.cr_id {
                continue;
            }
            let covered = groups.values().any(|f| {
                let holds = |id: &CrId| {
                    f.father.as_ref() == Some(id) || f.mother.as_ref() == Some(id)
                };
                holds(&person.cr_id) && holds(&spouse.cr_id)
            });
            if covered {
                continue;
            }
            let (father, mother) = couple_slots(person, spouse);
            let key = (
                Class::Biological,
                key_part(father.as_ref()),
                key_part(mother.as_ref()),
            );
            groups
                .entry(key)
                .or_insert_with(|| FamilyView::new(father, mother));
        }
    }
}

/// Assign a couple to father/mother slots by sex, falling back to id order.
fn couple_slots(a: &Person, b: &Person) -> (Option<CrId>, Option<CrId>) {
    use crate::model::Sex;
    match (a.sex, b.sex) {
        (Sex::Male, _) | (_, Sex::Female) => (Some(a.cr_id.clone()), Some(b.cr_id.clone())),
        (Sex::Female, _) | (_, Sex::Male) => (Some(b.cr_id.clone()), Some(a.cr_id.clone())),
        _ => (Some(a.cr_id.clone()), Some(b.cr_id.clone())),
    }
}

/// Attach marriage metadata recorded on either partner, keyed by the other.
fn attach_marriage(family: &mut FamilyView, persons: &BTreeMap<CrId, Person>) {
    let (Some(f), Some(m)) = (&family.father, &family.mother) else {
        return;
    };
    let fact = persons
        .get(f)
        .and_then(|p| p.marriages.get(m))
        .or_else(|| persons.get(m).and_then(|p| p.marriages.get(f)));
    if let Some(fact) = fact {
        family.marriage = Some(MarriageFact {
            date: fact.date.clone(),
            place: fact.place.clone(),
        });
    }
}
