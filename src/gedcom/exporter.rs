//! GEDCOM export.
//!
//! Family synthesis is shared with the Gramps exporter; this module owns the
//! line-format serialization. Cross-reference ids are assigned to every person
//! before any record is emitted, since INDI records carry `FAMC`/`FAMS`
//! references to family xrefs that must already exist.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExportError;
use crate::export::dates::{extract_year, iso_to_gedcom, normalize, DateForm};
use crate::export::families::synthesize_families;
use crate::export::privacy::{self, PrivacyOptions};
use crate::graph::FamilyGraph;
use crate::id::CrId;
use crate::model::{Pedigree, Sex};
use crate::report::{Diagnostic, ExportSummary};

/// Options for a GEDCOM export run.
#[derive(Debug, Clone, Default)]
pub struct GedcomExportOptions {
    pub privacy: PrivacyOptions,
}

/// Text that already is legal GEDCOM date syntax (qualified dates, `D MON
/// YYYY` shapes, bare years).
static RE_GEDCOM_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^((ABT|BEF|AFT|CAL|EST|FROM|TO|BET)\b.*|\d{1,2}\s+[A-Z]{3}\s+\d{3,4}|[A-Z]{3}\s+\d{3,4}|\d{3,4})$",
    )
    .unwrap()
});

/// Render a date through the fallback chain: ISO becomes GEDCOM date syntax;
/// text that already is GEDCOM date syntax passes through; otherwise a bare
/// 4-digit year is extracted as a last resort, and failing even that the text
/// is carried as a parenthesized date phrase. A date is never dropped.
fn gedcom_date(raw: &str) -> String {
    match normalize(raw) {
        Some(DateForm::Iso(iso)) => iso_to_gedcom(&iso),
        Some(DateForm::Text(text)) => {
            if RE_GEDCOM_DATE.is_match(&text) {
                text
            } else if let Some(year) = extract_year(&text) {
                year.to_string()
            } else {
                format!("({text})")
            }
        }
        None => String::new(),
    }
}

fn name_line(name: &str) -> String {
    match name.rsplit_once(' ') {
        Some((first, surname)) => format!("{first} /{surname}/"),
        None => name.to_owned(),
    }
}

/// Export the canonical graph as GEDCOM text.
pub fn export(
    graph: &FamilyGraph,
    options: &GedcomExportOptions,
) -> Result<(String, ExportSummary), ExportError> {
    let persons = graph.snapshot();
    if persons.is_empty() {
        return Err(ExportError::EmptyGraph);
    }
    let (persons, excluded) = privacy::apply_policy(&persons, &options.privacy);

    let synthesis = synthesize_families(&persons);
    let mut warnings: Vec<Diagnostic> = synthesis.warnings.clone();
    let families = &synthesis.families;

    // Xref assignment before emission.
    let mut person_xref: BTreeMap<CrId, String> = BTreeMap::new();
    for (i, id) in persons.keys().enumerate() {
        person_xref.insert(id.clone(), format!("I{i:04}"));
    }
    let family_xrefs: Vec<String> = (0..families.len()).map(|i| format!("F{i:04}")).collect();

    // Family membership per person, with the child's per-side qualifiers.
    let mut famc: BTreeMap<CrId, Vec<(String, Pedigree, Pedigree, bool)>> = BTreeMap::new();
    let mut fams: BTreeMap<CrId, Vec<String>> = BTreeMap::new();
    for (family, xref) in families.iter().zip(&family_xrefs) {
        let both_parents = family.father.is_some() && family.mother.is_some();
        for parent in family.father.iter().chain(family.mother.iter()) {
            fams.entry(parent.clone()).or_default().push(xref.clone());
        }
        for child in &family.children {
            famc.entry(child.child.clone()).or_default().push((
                xref.clone(),
                child.father_rel,
                child.mother_rel,
                both_parents,
            ));
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "0 HEAD");
    let _ = writeln!(out, "1 SOUR rootline");
    let _ = writeln!(out, "1 GEDC");
    let _ = writeln!(out, "2 VERS 5.5.1");
    let _ = writeln!(out, "2 FORM LINEAGE-LINKED");
    let _ = writeln!(out, "1 CHAR UTF-8");

    for (id, person) in &persons {
        let _ = writeln!(out, "0 @{}@ INDI", person_xref[id]);
        let _ = writeln!(out, "1 NAME {}", name_line(&person.name));
        if person.sex != Sex::Unknown {
            let _ = writeln!(out, "1 SEX {}", person.sex.as_letter());
        }
        emit_vital(&mut out, "BIRT", &person.birth_date, &person.birth_place);
        emit_vital(&mut out, "DEAT", &person.death_date, &person.death_place);
        emit_vital(&mut out, "BURI", &None, &person.burial_place);
        if let Some(occupation) = &person.occupation {
            let _ = writeln!(out, "1 OCCU {occupation}");
        }
        for (family_xref, father_rel, mother_rel, both_parents) in
            famc.get(id).into_iter().flatten()
        {
            let _ = writeln!(out, "1 FAMC @{family_xref}@");
            let pedi = match (father_rel, mother_rel) {
                (Pedigree::Birth, Pedigree::Birth) => None,
                (Pedigree::Adopted, _) | (_, Pedigree::Adopted) => Some("adopted"),
                _ => Some("stepchild"),
            };
            if let Some(pedi) = pedi {
                // One PEDI covers the whole family record; a per-side
                // distinction cannot be expressed in GEDCOM.
                if *both_parents && father_rel != mother_rel {
                    warnings.push(Diagnostic::warning(
                        id.as_str(),
                        format!(
                            "pedigree differs per parent side ({}/{}), exported as {pedi}",
                            father_rel.as_gramps(),
                            mother_rel.as_gramps()
                        ),
                    ));
                }
                let _ = writeln!(out, "2 PEDI {pedi}");
            }
        }
        for family_xref in fams.get(id).into_iter().flatten() {
            let _ = writeln!(out, "1 FAMS @{family_xref}@");
        }
    }

    for (family, xref) in families.iter().zip(&family_xrefs) {
        let _ = writeln!(out, "0 @{xref}@ FAM");
        if let Some(father) = &family.father {
            let _ = writeln!(out, "1 HUSB @{}@", person_xref[father]);
        }
        if let Some(mother) = &family.mother {
            let _ = writeln!(out, "1 WIFE @{}@", person_xref[mother]);
        }
        for child in &family.children {
            let _ = writeln!(out, "1 CHIL @{}@", person_xref[&child.child]);
        }
        if let Some(marriage) = &family.marriage {
            let _ = writeln!(out, "1 MARR");
            if let Some(date) = &marriage.date {
                let rendered = gedcom_date(date);
                if !rendered.is_empty() {
                    let _ = writeln!(out, "2 DATE {rendered}");
                }
            }
            if let Some(place) = &marriage.place {
                let _ = writeln!(out, "2 PLAC {place}");
            }
        }
    }

    let _ = writeln!(out, "0 TRLR");

    let summary = ExportSummary {
        persons: persons.len(),
        families: families.len(),
        events: 0,
        excluded,
        warnings,
    };
    tracing::info!(%summary, "gedcom export complete");
    Ok((out, summary))
}

fn emit_vital(out: &mut String, tag: &str, date: &Option<String>, place: &Option<String>) {
    if date.is_none() && place.is_none() {
        return;
    }
    let _ = writeln!(out, "1 {tag}");
    if let Some(date) = date {
        let rendered = gedcom_date(date);
        if !rendered.is_empty() {
            let _ = writeln!(out, "2 DATE {rendered}");
        }
    }
    if let Some(place) = place {
        let _ = writeln!(out, "2 PLAC {place}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    fn family_graph() -> FamilyGraph {
        let mut f = Person::new(id("a"), "John Doe").with_sex(Sex::Male);
        let mut m = Person::new(id("b"), "Jane Roe").with_sex(Sex::Female);
        let mut c = Person::new(id("c"), "Kid Doe");
        f.birth_date = Some("1900-01-15".into());
        f.death_date = Some("1950".into());
        m.death_date = Some("1960".into());
        c.death_date = Some("1999".into());
        c.father = Some(id("a"));
        c.mother = Some(id("b"));
        f.children = vec![id("c")];
        m.children = vec![id("c")];
        f.add_spouse(id("b"));
        m.add_spouse(id("a"));
        FamilyGraph::from_persons(vec![f, m, c]).unwrap()
    }

    #[test]
    fn exports_indi_and_fam_records() {
        let (text, summary) = export(&family_graph(), &GedcomExportOptions::default()).unwrap();
        assert_eq!(summary.persons, 3);
        assert_eq!(summary.families, 1);
        assert!(text.contains("0 @I0000@ INDI"));
        assert!(text.contains("1 NAME John /Doe/"));
        assert!(text.contains("2 DATE 15 JAN 1900"));
        assert!(text.contains("0 @F0000@ FAM"));
        assert!(text.contains("1 CHIL @"));
        assert!(text.ends_with("0 TRLR\n"));
    }

    #[test]
    fn famc_and_fams_back_references_line_up() {
        let (text, _) = export(&family_graph(), &GedcomExportOptions::default()).unwrap();
        assert!(text.contains("1 FAMC @F0000@"));
        assert!(text.contains("1 FAMS @F0000@"));
    }

    #[test]
    fn per_side_qualifier_difference_is_flagged() {
        // Birth child of father, stepchild of mother, same family.
        let mut f = Person::new(id("a"), "John Doe").with_sex(Sex::Male);
        let mut sm = Person::new(id("b"), "Sue Doe").with_sex(Sex::Female);
        let mut c = Person::new(id("c"), "Kid Doe");
        f.death_date = Some("1950".into());
        sm.death_date = Some("1960".into());
        c.death_date = Some("1999".into());
        c.father = Some(id("a"));
        c.add_stepmother(id("b"));
        f.children = vec![id("c")];
        sm.children = vec![id("c")];
        f.add_spouse(id("b"));
        sm.add_spouse(id("a"));
        let graph = FamilyGraph::from_persons(vec![f, sm, c]).unwrap();

        let (text, summary) = export(&graph, &GedcomExportOptions::default()).unwrap();
        assert!(text.contains("2 PEDI stepchild"));
        assert!(summary
            .warnings
            .iter()
            .any(|w| w.message.contains("differs per parent side")));
    }

    #[test]
    fn date_fallback_chain() {
        // Already-legal GEDCOM syntax passes through; otherwise a year is
        // extracted; otherwise the text is carried as a date phrase.
        assert_eq!(gedcom_date("1900-01-15"), "15 JAN 1900");
        assert_eq!(gedcom_date("ABT 1850"), "ABT 1850");
        assert_eq!(gedcom_date("about springtime 1850"), "1850");
        assert_eq!(gedcom_date("springtime"), "(springtime)");
    }

    #[test]
    fn free_text_dates_pass_through() {
        let mut p = Person::new(id("x"), "Old Timer");
        p.birth_date = Some("ABT 1850".into());
        p.death_date = Some("1930".into());
        let graph = FamilyGraph::from_persons(vec![p]).unwrap();
        let (text, _) = export(&graph, &GedcomExportOptions::default()).unwrap();
        assert!(text.contains("2 DATE ABT 1850"));
        assert!(text.contains("2 DATE 1930"));
    }
}
