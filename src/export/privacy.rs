//! Living-person privacy policy.
//!
//! When privacy protection is enabled, a living person's identity fields are
//! replaced per the configured display policy — obfuscated name, initials, or
//! full exclusion. Excluded persons are also pruned from every relationship
//! and event reference that would otherwise dangle.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::CrId;
use crate::model::{Event, Person};

/// How a living person is displayed in exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivingPolicy {
    /// Replace the name with a fixed marker and clear vitals.
    #[default]
    Obfuscate,
    /// Reduce the name to initials and clear vitals.
    Initials,
    /// Omit the person and prune every reference to them.
    Exclude,
}

/// Privacy settings for an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyOptions {
    pub enabled: bool,
    pub policy: LivingPolicy,
    /// A person born within this many years of the reference year, with no
    /// death date, is treated as living.
    pub living_cutoff_years: u32,
    /// Year the living check is evaluated against. `None` uses the wall clock.
    pub reference_year: Option<i32>,
}

impl Default for PrivacyOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: LivingPolicy::Obfuscate,
            living_cutoff_years: 110,
            reference_year: None,
        }
    }
}

fn current_year() -> i32 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    1970 + (secs / 31_556_952) as i32
}

/// Whether a person is treated as living under the given options.
///
/// No death date and either an unknown birth year or a birth year within the
/// cutoff window means living.
pub fn is_living(person: &Person, opts: &PrivacyOptions) -> bool {
    if person.death_date.is_some() {
        return false;
    }
    let reference = opts.reference_year.unwrap_or_else(current_year);
    match person.birth_year() {
        Some(year) => reference.saturating_sub(year) < opts.living_cutoff_years as i32,
        None => true,
    }
}

fn initials(name: &str) -> String {
    let parts: Vec<String> = name
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .map(|c| format!("{}.", c.to_uppercase()))
        .collect();
    if parts.is_empty() {
        "?".into()
    } else {
        parts.join(" ")
    }
}

fn mask(person: &Person, policy: LivingPolicy) -> Person {
    let mut masked = person.clone();
    masked.name = match policy {
        LivingPolicy::Obfuscate => "Living".into(),
        LivingPolicy::Initials => initials(&person.name),
        LivingPolicy::Exclude => unreachable!("excluded persons are filtered, not masked"),
    };
    masked.birth_date = None;
    masked.death_date = None;
    masked.birth_place = None;
    masked.death_place = None;
    masked.burial_place = None;
    masked.occupation = None;
    masked
}

/// Apply the privacy policy to a person set.
///
/// Returns the filtered/masked set and the number of excluded persons. After
/// exclusion, every relationship reference to an excluded person is pruned so
/// no family or spouse link dangles.
pub fn apply_policy(
    persons: &BTreeMap<CrId, Person>,
    opts: &PrivacyOptions,
) -> (BTreeMap<CrId, Person>, usize) {
    if !opts.enabled {
        return (persons.clone(), 0);
    }

    let excluded: BTreeSet<CrId> = if opts.policy == LivingPolicy::Exclude {
        persons
            .values()
            .filter(|p| is_living(p, opts))
            .map(|p| p.cr_id.clone())
            .collect()
    } else {
        BTreeSet::new()
    };

    let mut result: BTreeMap<CrId, Person> = BTreeMap::new();
    for (id, person) in persons {
        if excluded.contains(id) {
            continue;
        }
        let mut out = if is_living(person, opts) {
            mask(person, opts.policy)
        } else {
            person.clone()
        };
        prune_refs(&mut out, &excluded);
        result.insert(id.clone(), out);
    }
    (result, excluded.len())
}

fn prune_refs(person: &mut Person, excluded: &BTreeSet<CrId>) {
    let gone = |id: &Option<CrId>| id.as_ref().is_some_and(|i| excluded.contains(i));
    if gone(&person.father) {
        person.father = None;
    }
    if gone(&person.mother) {
        person.mother = None;
    }
    if gone(&person.adoptive_father) {
        person.adoptive_father = None;
    }
    if gone(&person.adoptive_mother) {
        person.adoptive_mother = None;
    }
    person.stepfathers.retain(|i| !excluded.contains(i));
    person.stepmothers.retain(|i| !excluded.contains(i));
    person.spouses.retain(|i| !excluded.contains(i));
    person.children.retain(|i| !excluded.contains(i));
    person.marriages.retain(|i, _| !excluded.contains(i));
}

/// Prune excluded participants from events.
pub fn prune_events(events: &mut [Event], persons: &BTreeMap<CrId, Person>) {
    for event in events.iter_mut() {
        event.persons.retain(|p| persons.contains_key(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    fn opts(policy: LivingPolicy) -> PrivacyOptions {
        PrivacyOptions {
            enabled: true,
            policy,
            living_cutoff_years: 110,
            reference_year: Some(2020),
        }
    }

    #[test]
    fn dead_people_are_not_living() {
        let mut p = Person::new(id("a"), "Ada");
        p.death_date = Some("1950".into());
        assert!(!is_living(&p, &opts(LivingPolicy::Obfuscate)));
    }

    #[test]
    fn recent_birth_without_death_is_living() {
        let mut p = Person::new(id("a"), "Ada");
        p.birth_date = Some("1980-05-01".into());
        assert!(is_living(&p, &opts(LivingPolicy::Obfuscate)));
    }

    #[test]
    fn old_birth_without_death_is_not_living() {
        let mut p = Person::new(id("a"), "Ada");
        p.birth_date = Some("1850".into());
        assert!(!is_living(&p, &opts(LivingPolicy::Obfuscate)));
    }

    #[test]
    fn obfuscation_clears_identity_fields() {
        let mut p = Person::new(id("a"), "Ada Lovelace");
        p.birth_date = Some("1990".into());
        p.occupation = Some("engineer".into());
        let map: BTreeMap<CrId, Person> = [(p.cr_id.clone(), p)].into();

        let (masked, excluded) = apply_policy(&map, &opts(LivingPolicy::Obfuscate));
        assert_eq!(excluded, 0);
        let out = masked.get(&id("a")).unwrap();
        assert_eq!(out.name, "Living");
        assert!(out.birth_date.is_none());
        assert!(out.occupation.is_none());
    }

    #[test]
    fn initials_policy() {
        let mut p = Person::new(id("a"), "Ada Byron Lovelace");
        p.birth_date = Some("1990".into());
        let map: BTreeMap<CrId, Person> = [(p.cr_id.clone(), p)].into();

        let (masked, _) = apply_policy(&map, &opts(LivingPolicy::Initials));
        assert_eq!(masked.get(&id("a")).unwrap().name, "A. B. L.");
    }

    #[test]
    fn exclusion_prunes_dangling_references() {
        let mut parent = Person::new(id("p"), "Parent");
        parent.death_date = Some("1990".into());
        parent.children = vec![id("kid")];
        parent.spouses = vec![id("kid")]; // contrived, exercises spouse pruning too
        let mut kid = Person::new(id("kid"), "Kid");
        kid.birth_date = Some("2000".into());
        kid.father = Some(id("p"));
        let map: BTreeMap<CrId, Person> = [
            (parent.cr_id.clone(), parent),
            (kid.cr_id.clone(), kid),
        ]
        .into();

        let (out, excluded) = apply_policy(&map, &opts(LivingPolicy::Exclude));
        assert_eq!(excluded, 1);
        assert!(!out.contains_key(&id("kid")));
        let parent = out.get(&id("p")).unwrap();
        assert!(parent.children.is_empty());
        assert!(parent.spouses.is_empty());
    }

    #[test]
    fn disabled_privacy_is_a_no_op() {
        let mut p = Person::new(id("a"), "Ada");
        p.birth_date = Some("1995".into());
        let map: BTreeMap<CrId, Person> = [(p.cr_id.clone(), p)].into();
        let (out, excluded) = apply_policy(&map, &PrivacyOptions::default());
        assert_eq!(excluded, 0);
        assert_eq!(out.get(&id("a")).unwrap().name, "Ada");
    }
}
