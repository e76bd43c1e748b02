//! Format-neutral relationship resolution.
//!
//! Interchange formats describe relationships through family records that
//! reference persons by format-local handles, and a family can reference
//! persons the parser has not visited yet. Resolution therefore runs as an
//! explicit two-stage pipeline over the full family list:
//!
//! 1. Pass 1 materializes every person node with empty relationship fields.
//! 2. Pass 2 links: per family, per child, the relationship-type qualifier is
//!    branched on per parent side independently, then the parent couple is
//!    registered as spouses.
//!
//! Both Gramps and GEDCOM parse into [`RawFamily`] values and share this
//! resolver; the exporters invert it in [`crate::export::families`].

use std::collections::{BTreeMap, HashSet};

use crate::id::CrId;
use crate::model::{MarriageFact, Pedigree, Person};
use crate::report::ParseReport;

/// One child's entry in a raw family record, qualified per parent side.
#[derive(Debug, Clone)]
pub struct RawChildRef {
    pub child: CrId,
    pub father_rel: Pedigree,
    pub mother_rel: Pedigree,
}

impl RawChildRef {
    pub fn birth(child: CrId) -> Self {
        Self {
            child,
            father_rel: Pedigree::Birth,
            mother_rel: Pedigree::Birth,
        }
    }
}

/// A family record as parsed from an interchange format, before resolution.
#[derive(Debug, Clone)]
pub struct RawFamily {
    /// The format-local family identifier, kept for diagnostics.
    pub id: String,
    pub father: Option<CrId>,
    pub mother: Option<CrId>,
    pub children: Vec<RawChildRef>,
    /// Marriage-type event attached to the family, if any.
    pub marriage: Option<MarriageFact>,
}

impl RawFamily {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            father: None,
            mother: None,
            children: Vec::new(),
            marriage: None,
        }
    }
}

/// Resolve the family list onto the person set, in exactly two passes.
///
/// Families referencing unknown handles contribute warnings and skip the
/// affected links; a family with neither parent is discarded silently (an
/// empty family shell is legal in the source formats).
pub fn resolve_families(
    persons: &mut BTreeMap<CrId, Person>,
    families: &[RawFamily],
    report: &mut ParseReport,
) {
    // Pass 1: every person starts with empty relationship fields, so
    // resolution over the same person set is repeatable.
    for person in persons.values_mut() {
        person.father = None;
        person.mother = None;
        person.stepfathers.clear();
        person.stepmothers.clear();
        person.adoptive_father = None;
        person.adoptive_mother = None;
        person.spouses.clear();
        person.marriages.clear();
        person.children.clear();
    }

    // Pass 2: link.
    let mut seen_pairs: HashSet<(CrId, CrId)> = HashSet::new();
    for family in families {
        link_family(persons, family, &mut seen_pairs, report);
    }

    tracing::debug!(
        persons = persons.len(),
        families = families.len(),
        "relationship resolution complete"
    );
}

fn known<'a>(
    persons: &BTreeMap<CrId, Person>,
    id: Option<&'a CrId>,
    family: &RawFamily,
    side: &str,
    report: &mut ParseReport,
) -> Option<&'a CrId> {
    let id = id?;
    if persons.contains_key(id) {
        Some(id)
    } else {
        report.warning(
            format!("families/{}", family.id),
            format!("{side} reference {id} has no person record, link skipped"),
        );
        None
    }
}

fn link_family(
    persons: &mut BTreeMap<CrId, Person>,
    family: &RawFamily,
    seen_pairs: &mut HashSet<(CrId, CrId)>,
    report: &mut ParseReport,
) {
    let father = known(persons, family.father.as_ref(), family, "father", report).cloned();
    let mother = known(persons, family.mother.as_ref(), family, "mother", report).cloned();

    if father.is_none() && mother.is_none() {
        tracing::debug!(family = %family.id, "empty family shell discarded");
        return;
    }

    for child_ref in &family.children {
        if !persons.contains_key(&child_ref.child) {
            report.warning(
                format!("families/{}", family.id),
                format!(
                    "child reference {} has no person record, link skipped",
                    child_ref.child
                ),
            );
            continue;
        }
        if let Some(father) = &father {
            link_parent_side(persons, &child_ref.child, father, child_ref.father_rel, Side::Father, family, report);
        }
        if let Some(mother) = &mother {
            link_parent_side(persons, &child_ref.child, mother, child_ref.mother_rel, Side::Mother, family, report);
        }
    }

    if let (Some(father), Some(mother)) = (&father, &mother) {
        if !seen_pairs.insert((father.clone(), mother.clone())) {
            // Two family records with the same couple (e.g. remarriage after
            // divorce) merge into one set of relationships; the chronological
            // distinction cannot be preserved.
            report.warning(
                format!("families/{}", family.id),
                format!("parent pair ({father}, {mother}) appears in multiple family records, merged"),
            );
        }
        if let Some(p) = persons.get_mut(father) {
            p.add_spouse(mother.clone());
            if let Some(fact) = &family.marriage {
                p.marriages.entry(mother.clone()).or_insert_with(|| fact.clone());
            }
        }
        if let Some(p) = persons.get_mut(mother) {
            p.add_spouse(father.clone());
            if let Some(fact) = &family.marriage {
                p.marriages.entry(father.clone()).or_insert_with(|| fact.clone());
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Father,
    Mother,
}

fn link_parent_side(
    persons: &mut BTreeMap<CrId, Person>,
    child_id: &CrId,
    parent_id: &CrId,
    rel: Pedigree,
    side: Side,
    family: &RawFamily,
    report: &mut ParseReport,
) {
    {
        let child = persons
            .get_mut(child_id)
            .expect("child presence checked by caller");
        match (rel, side) {
            // Step-parents accumulate across remarriages, never overwrite.
            (Pedigree::Stepchild, Side::Father) => child.add_stepfather(parent_id.clone()),
            (Pedigree::Stepchild, Side::Mother) => child.add_stepmother(parent_id.clone()),
            // First adoption wins; duplicate family entries do not overwrite.
            (Pedigree::Adopted, Side::Father) => {
                if child.adoptive_father.is_none() {
                    child.adoptive_father = Some(parent_id.clone());
                }
            }
            (Pedigree::Adopted, Side::Mother) => {
                if child.adoptive_mother.is_none() {
                    child.adoptive_mother = Some(parent_id.clone());
                }
            }
            (Pedigree::Birth, Side::Father) => match &child.father {
                None => child.father = Some(parent_id.clone()),
                Some(existing) if existing != parent_id => {
                    report.warning(
                        format!("families/{}", family.id),
                        format!(
                            "child {child_id} already has birth father {existing}, ignoring {parent_id}"
                        ),
                    );
                }
                Some(_) => {}
            },
            (Pedigree::Birth, Side::Mother) => match &child.mother {
                None => child.mother = Some(parent_id.clone()),
                Some(existing) if existing != parent_id => {
                    report.warning(
                        format!("families/{}", family.id),
                        format!(
                            "child {child_id} already has birth mother {existing}, ignoring {parent_id}"
                        ),
                    );
                }
                Some(_) => {}
            },
        }
    }
    if let Some(parent) = persons.get_mut(parent_id) {
        parent.add_child(child_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    fn people(ids: &[&str]) -> BTreeMap<CrId, Person> {
        ids.iter()
            .map(|s| (id(s), Person::new(id(s), s.to_uppercase())))
            .collect()
    }

    #[test]
    fn birth_family_sets_both_parents_and_spouses() {
        let mut persons = people(&["f", "m", "c"]);
        let mut family = RawFamily::new("F0001");
        family.father = Some(id("f"));
        family.mother = Some(id("m"));
        family.children.push(RawChildRef::birth(id("c")));

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[family], &mut report);

        let c = &persons[&id("c")];
        assert_eq!(c.father, Some(id("f")));
        assert_eq!(c.mother, Some(id("m")));
        assert!(persons[&id("f")].spouses.contains(&id("m")));
        assert!(persons[&id("m")].spouses.contains(&id("f")));
        assert!(persons[&id("f")].children.contains(&id("c")));
        assert!(report.valid());
    }

    #[test]
    fn adopted_on_father_side_leaves_birth_father_unset() {
        // The spec scenario: family (F, M, child C with frel="Adopted").
        let mut persons = people(&["f", "m", "c"]);
        let mut family = RawFamily::new("F0001");
        family.father = Some(id("f"));
        family.mother = Some(id("m"));
        family.children.push(RawChildRef {
            child: id("c"),
            father_rel: Pedigree::Adopted,
            mother_rel: Pedigree::Birth,
        });

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[family], &mut report);

        let c = &persons[&id("c")];
        assert_eq!(c.adoptive_father, Some(id("f")));
        assert_eq!(c.father, None);
        assert_eq!(c.mother, Some(id("m")));
        assert!(persons[&id("f")].spouses.contains(&id("m")));
    }

    #[test]
    fn first_adoption_wins_on_duplicate_entries() {
        let mut persons = people(&["a1", "a2", "c"]);
        let mut f1 = RawFamily::new("F1");
        f1.father = Some(id("a1"));
        f1.children.push(RawChildRef {
            child: id("c"),
            father_rel: Pedigree::Adopted,
            mother_rel: Pedigree::Birth,
        });
        let mut f2 = RawFamily::new("F2");
        f2.father = Some(id("a2"));
        f2.children.push(RawChildRef {
            child: id("c"),
            father_rel: Pedigree::Adopted,
            mother_rel: Pedigree::Birth,
        });

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[f1, f2], &mut report);
        assert_eq!(persons[&id("c")].adoptive_father, Some(id("a1")));
    }

    #[test]
    fn step_parents_accumulate_across_remarriages() {
        let mut persons = people(&["s1", "s2", "c"]);
        let mut families = Vec::new();
        for (i, step) in ["s1", "s2"].iter().enumerate() {
            let mut fam = RawFamily::new(format!("F{i}"));
            fam.mother = Some(id(step));
            fam.children.push(RawChildRef {
                child: id("c"),
                father_rel: Pedigree::Birth,
                mother_rel: Pedigree::Stepchild,
            });
            families.push(fam);
        }

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &families, &mut report);
        assert_eq!(persons[&id("c")].stepmothers, vec![id("s1"), id("s2")]);
        assert_eq!(persons[&id("c")].mother, None);
    }

    #[test]
    fn single_parent_family_still_resolves() {
        let mut persons = people(&["m", "c"]);
        let mut family = RawFamily::new("F1");
        family.mother = Some(id("m"));
        family.children.push(RawChildRef::birth(id("c")));

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[family], &mut report);
        assert_eq!(persons[&id("c")].mother, Some(id("m")));
        assert!(persons[&id("m")].spouses.is_empty());
        assert!(report.valid());
    }

    #[test]
    fn empty_family_shell_is_discarded_without_error() {
        let mut persons = people(&["c"]);
        let mut family = RawFamily::new("F1");
        family.children.push(RawChildRef::birth(id("c")));

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[family], &mut report);
        assert!(report.valid());
        assert!(report.diagnostics.is_empty());
        assert_eq!(persons[&id("c")].father, None);
    }

    #[test]
    fn unknown_handles_warn_and_skip() {
        let mut persons = people(&["c"]);
        let mut family = RawFamily::new("F1");
        family.father = Some(id("ghost"));
        family.children.push(RawChildRef::birth(id("c")));

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[family], &mut report);
        assert!(report.valid()); // warnings only
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(persons[&id("c")].father, None);
    }

    #[test]
    fn marriage_metadata_recorded_per_partner() {
        let mut persons = people(&["f", "m"]);
        let mut family = RawFamily::new("F1");
        family.father = Some(id("f"));
        family.mother = Some(id("m"));
        family.marriage = Some(MarriageFact {
            date: Some("1900-06-01".into()),
            place: Some("Springfield".into()),
        });

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[family], &mut report);
        assert_eq!(
            persons[&id("f")].marriages[&id("m")].date.as_deref(),
            Some("1900-06-01")
        );
        assert_eq!(
            persons[&id("m")].marriages[&id("f")].place.as_deref(),
            Some("Springfield")
        );
    }

    #[test]
    fn duplicate_parent_pair_is_flagged() {
        let mut persons = people(&["f", "m"]);
        let mut f1 = RawFamily::new("F1");
        f1.father = Some(id("f"));
        f1.mother = Some(id("m"));
        let mut f2 = RawFamily::new("F2");
        f2.father = Some(id("f"));
        f2.mother = Some(id("m"));

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &[f1, f2], &mut report);
        assert_eq!(report.warnings().count(), 1);
        // Merged, not duplicated.
        assert_eq!(persons[&id("f")].spouses.len(), 1);
    }

    #[test]
    fn resolution_is_repeatable() {
        let mut persons = people(&["f", "m", "c"]);
        let mut family = RawFamily::new("F1");
        family.father = Some(id("f"));
        family.mother = Some(id("m"));
        family.children.push(RawChildRef::birth(id("c")));
        let families = [family];

        let mut report = ParseReport::new();
        resolve_families(&mut persons, &families, &mut report);
        let snapshot = persons.clone();
        resolve_families(&mut persons, &families, &mut report);
        assert_eq!(persons, snapshot);
    }
}
