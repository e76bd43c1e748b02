//! Human-readable kinship terms from shortest relationship paths.
//!
//! A path is reduced to its up/down/spouse shape and matched against the
//! standard English kinship grid: direct ancestors and descendants, siblings,
//! aunts/uncles, nieces/nephews, and cousins with degree and removal. A single
//! leading or trailing spouse hop yields the in-law variant. Anything the grid
//! cannot name falls back to a generic term rather than failing.

use std::collections::BTreeMap;

use crate::id::CrId;
use crate::model::{Person, Sex};

use super::traverse::{KinStep, StepKind};
use super::ParentKind;

/// Compute the kinship term for `path`, as in "B is A's &lt;term&gt;" where the
/// path leads from A to B.
pub fn kinship_term(path: &[KinStep], persons: &BTreeMap<CrId, Person>) -> String {
    if path.is_empty() {
        return "self".into();
    }
    let target_sex = path
        .last()
        .and_then(|step| persons.get(&step.to))
        .map(|p| p.sex)
        .unwrap_or(Sex::Unknown);

    // Single-hop special cases keep the parent-kind qualifier.
    if path.len() == 1 {
        return match path[0].kind {
            StepKind::Up(ParentKind::Biological) => sexed(target_sex, "father", "mother", "parent"),
            StepKind::Up(ParentKind::Step) => {
                sexed(target_sex, "stepfather", "stepmother", "step-parent")
            }
            StepKind::Up(ParentKind::Adoptive) => sexed(
                target_sex,
                "adoptive father",
                "adoptive mother",
                "adoptive parent",
            ),
            StepKind::Down(ParentKind::Biological) => sexed(target_sex, "son", "daughter", "child"),
            StepKind::Down(ParentKind::Step) => {
                sexed(target_sex, "stepson", "stepdaughter", "stepchild")
            }
            StepKind::Down(ParentKind::Adoptive) => sexed(
                target_sex,
                "adopted son",
                "adopted daughter",
                "adopted child",
            ),
            StepKind::Spouse => sexed(target_sex, "husband", "wife", "spouse"),
        }
        .to_owned();
    }

    // One spouse hop at either end becomes an in-law suffix.
    if let StepKind::Spouse = path[path.len() - 1].kind {
        if let Some(base) = blood_term(&path[..path.len() - 1], Sex::Unknown) {
            return in_law(&base, target_sex);
        }
    }
    if let StepKind::Spouse = path[0].kind {
        if let Some(base) = blood_term(&path[1..], Sex::Unknown) {
            return in_law(&base, target_sex);
        }
    }

    blood_term(path, target_sex).unwrap_or_else(|| "relative".into())
}

fn sexed(sex: Sex, male: &'static str, female: &'static str, neutral: &'static str) -> &'static str {
    match sex {
        Sex::Male => male,
        Sex::Female => female,
        Sex::Unknown => neutral,
    }
}

/// Name a pure up-then-down path (no spouse hops). Returns `None` when the
/// path has another shape.
fn blood_term(path: &[KinStep], target_sex: Sex) -> Option<String> {
    let mut ups = 0usize;
    let mut downs = 0usize;
    for step in path {
        match step.kind {
            StepKind::Up(_) if downs == 0 => ups += 1,
            StepKind::Down(_) => downs += 1,
            _ => return None,
        }
    }

    let term = match (ups, downs) {
        (0, 0) => "self".to_owned(),
        (n, 0) => ancestor_term(n, target_sex),
        (0, n) => descendant_term(n, target_sex),
        (1, 1) => sexed(target_sex, "brother", "sister", "sibling").to_owned(),
        (m, 1) => {
            // Parent's sibling line: uncle, great-uncle, ...
            let base = sexed(target_sex, "uncle", "aunt", "uncle or aunt");
            with_great_prefix(m - 2, base)
        }
        (1, n) => {
            let base = sexed(target_sex, "nephew", "niece", "nephew or niece");
            with_great_prefix(n - 2, base)
        }
        (m, n) => {
            let degree = m.min(n) - 1;
            let removed = m.abs_diff(n);
            let mut term = format!("{} cousin", ordinal(degree));
            match removed {
                0 => {}
                1 => term.push_str(" once removed"),
                2 => term.push_str(" twice removed"),
                k => term.push_str(&format!(" {k} times removed")),
            }
            term
        }
    };
    Some(term)
}

fn ancestor_term(generations: usize, sex: Sex) -> String {
    match generations {
        1 => sexed(sex, "father", "mother", "parent").to_owned(),
        n => {
            let base = sexed(sex, "grandfather", "grandmother", "grandparent");
            with_great_prefix(n - 2, base)
        }
    }
}

fn descendant_term(generations: usize, sex: Sex) -> String {
    match generations {
        1 => sexed(sex, "son", "daughter", "child").to_owned(),
        n => {
            let base = sexed(sex, "grandson", "granddaughter", "grandchild");
            with_great_prefix(n - 2, base)
        }
    }
}

fn with_great_prefix(greats: usize, base: &str) -> String {
    let mut term = String::new();
    for _ in 0..greats {
        term.push_str("great-");
    }
    term.push_str(base);
    term
}

fn in_law(base: &str, sex: Sex) -> String {
    match base {
        "parent" => format!("{}-in-law", sexed(sex, "father", "mother", "parent")),
        "child" => format!("{}-in-law", sexed(sex, "son", "daughter", "child")),
        "sibling" => format!("{}-in-law", sexed(sex, "brother", "sister", "sibling")),
        other => format!("{other}'s spouse"),
    }
}

fn ordinal(n: usize) -> String {
    match n {
        1 => "first".into(),
        2 => "second".into(),
        3 => "third".into(),
        4 => "fourth".into(),
        5 => "fifth".into(),
        k => format!("{k}th"),
    }
}
