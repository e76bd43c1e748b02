//! GEDCOM interchange.
//!
//! The line-tag/level format parses into records keyed by cross-reference id
//! and runs through the same two-pass resolver as Gramps. GEDCOM carries one
//! pedigree qualifier per child per family (`FAMC`/`PEDI`), not one per parent
//! side; the import applies it to both present sides, and the export flags the
//! per-side distinction it cannot express.

pub mod exporter;
pub mod line;
pub mod parser;

use std::collections::BTreeMap;

pub use exporter::{export, GedcomExportOptions};
pub use parser::{parse, ParsedGedcom};

use crate::error::GedcomError;
use crate::id::CrId;
use crate::model::{MarriageFact, Pedigree, Person, Sex};
use crate::report::{ImportSummary, ParseReport};
use crate::resolve::{resolve_families, RawChildRef, RawFamily};

/// A GEDCOM document converted to the canonical model.
#[derive(Debug)]
pub struct GedcomImport {
    pub persons: BTreeMap<CrId, Person>,
    /// Full diagnostic list; check `report.valid()` before committing.
    pub report: ParseReport,
    pub summary: ImportSummary,
}

fn pedigree_from(pedi: Option<&str>, path: &str, report: &mut ParseReport) -> Pedigree {
    match pedi {
        None | Some("birth") => Pedigree::Birth,
        Some("adopted") => Pedigree::Adopted,
        Some("stepchild") | Some("step") => Pedigree::Stepchild,
        Some(other) => {
            report.warning(
                path,
                format!("unsupported pedigree \"{other}\", treated as birth"),
            );
            Pedigree::Birth
        }
    }
}

/// Parse and resolve GEDCOM text into the canonical model.
///
/// Cross-reference ids are kept verbatim as stable ids.
pub fn import_document(text: &str) -> Result<GedcomImport, GedcomError> {
    let ParsedGedcom {
        document,
        mut report,
    } = parser::parse(text)?;

    let mut persons: BTreeMap<CrId, Person> = BTreeMap::new();
    for ged_person in document.persons.values() {
        let Some(cr_id) = CrId::new(&ged_person.xref) else {
            continue;
        };
        let mut person = Person::new(cr_id.clone(), ged_person.name.clone());
        person.sex = ged_person
            .sex
            .as_deref()
            .map(Sex::from_letter)
            .unwrap_or_default();
        person.birth_date = ged_person.birth_date.clone();
        person.birth_place = ged_person.birth_place.clone();
        person.death_date = ged_person.death_date.clone();
        person.death_place = ged_person.death_place.clone();
        person.burial_place = ged_person.burial_place.clone();
        person.occupation = ged_person.occupation.clone();
        persons.insert(cr_id, person);
    }

    // The per-child pedigree lives on the INDI side (FAMC/PEDI); index it
    // before building the family list.
    let mut pedigree: BTreeMap<(String, String), Pedigree> = BTreeMap::new();
    for ged_person in document.persons.values() {
        for (family_xref, pedi) in &ged_person.famc {
            let path = format!("INDI {}", ged_person.xref);
            let rel = pedigree_from(pedi.as_deref(), &path, &mut report);
            pedigree.insert((family_xref.clone(), ged_person.xref.clone()), rel);
        }
    }

    let mut families: Vec<RawFamily> = Vec::new();
    for ged_family in document.families.values() {
        let mut raw = RawFamily::new(&ged_family.xref);
        raw.father = ged_family.husband.clone().and_then(CrId::new);
        raw.mother = ged_family.wife.clone().and_then(CrId::new);
        for child_xref in &ged_family.children {
            let Some(child_id) = CrId::new(child_xref) else {
                continue;
            };
            // One qualifier covers both present parent sides.
            let rel = pedigree
                .get(&(ged_family.xref.clone(), child_xref.clone()))
                .copied()
                .unwrap_or_default();
            raw.children.push(RawChildRef {
                child: child_id,
                father_rel: rel,
                mother_rel: rel,
            });
        }
        if ged_family.marriage_date.is_some() || ged_family.marriage_place.is_some() {
            raw.marriage = Some(MarriageFact {
                date: ged_family.marriage_date.clone(),
                place: ged_family.marriage_place.clone(),
            });
        }
        families.push(raw);
    }

    resolve_families(&mut persons, &families, &mut report);

    let mut summary = ImportSummary {
        persons: persons.len(),
        families: families.len(),
        ..Default::default()
    };
    summary.record_report(&report);

    Ok(GedcomImport {
        persons,
        report,
        summary,
    })
}
