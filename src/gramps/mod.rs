//! Gramps XML interchange.
//!
//! [`parser`] reads a `<database>` document into per-collection handle maps;
//! [`import_document`] converts the parsed document to the canonical model,
//! running the two-pass relationship resolver over the family list;
//! [`exporter`] walks the canonical graph back out, re-deriving family records
//! as the resolver's inverse.

pub mod exporter;
pub mod model;
pub mod parser;
pub(crate) mod xml;

use std::collections::BTreeMap;

pub use exporter::{export, GrampsExportOptions};
pub use parser::{parse, ParsedGramps};

use crate::error::GrampsError;
use crate::id::CrId;
use crate::model::{Citation, Confidence, Event, EventType, MarriageFact, Pedigree, Person, Place};
use crate::report::{ImportSummary, ParseReport};
use crate::resolve::{resolve_families, RawChildRef, RawFamily};

/// A Gramps document converted to the canonical model.
#[derive(Debug)]
pub struct CanonicalImport {
    pub persons: BTreeMap<CrId, Person>,
    pub events: Vec<Event>,
    pub places: BTreeMap<String, Place>,
    pub citations: Vec<Citation>,
    /// Full diagnostic list; check `report.valid()` before committing.
    pub report: ParseReport,
    pub summary: ImportSummary,
}

fn pedigree_from(
    attr: Option<&str>,
    path: &str,
    side: &str,
    report: &mut ParseReport,
) -> Pedigree {
    match attr {
        None => Pedigree::Birth,
        Some(raw) => Pedigree::from_gramps(raw).unwrap_or_else(|| {
            report.warning(
                path,
                format!("unsupported {side} relationship \"{raw}\", treated as Birth"),
            );
            Pedigree::Birth
        }),
    }
}

/// Parse and resolve a Gramps XML document into the canonical model.
///
/// Native handles are kept verbatim as stable ids, so re-imports of the same
/// document are stable.
pub fn import_document(xml_text: &str) -> Result<CanonicalImport, GrampsError> {
    let ParsedGramps {
        document,
        mut report,
    } = parser::parse(xml_text)?;

    // Person skeletons; the resolver fills relationship fields.
    let mut persons: BTreeMap<CrId, Person> = BTreeMap::new();
    for gramps_person in document.persons.values() {
        let Some(cr_id) = CrId::new(&gramps_person.handle) else {
            continue;
        };
        let mut person = Person::new(cr_id.clone(), gramps_person.name.clone());
        person.sex = gramps_person.sex;
        person.birth_date = gramps_person.birth_date.clone();
        person.death_date = gramps_person.death_date.clone();
        person.birth_place = gramps_person.birth_place.clone();
        person.death_place = gramps_person.death_place.clone();
        person.burial_place = gramps_person.burial_place.clone();
        person.occupation = gramps_person.occupation.clone();
        persons.insert(cr_id, person);
    }

    let place_names = parser::place_names(&document);
    let mut families: Vec<RawFamily> = Vec::new();
    for gramps_family in document.families.values() {
        let path = format!("families/{}", gramps_family.handle);
        let mut raw = RawFamily::new(&gramps_family.handle);
        raw.father = gramps_family.father.clone().and_then(CrId::new);
        raw.mother = gramps_family.mother.clone().and_then(CrId::new);
        for child in &gramps_family.children {
            let Some(child_id) = CrId::new(&child.hlink) else {
                continue;
            };
            raw.children.push(RawChildRef {
                child: child_id,
                father_rel: pedigree_from(child.frel.as_deref(), &path, "father", &mut report),
                mother_rel: pedigree_from(child.mrel.as_deref(), &path, "mother", &mut report),
            });
        }
        raw.marriage = gramps_family
            .event_refs
            .iter()
            .filter_map(|handle| document.events.get(handle))
            .find(|event| EventType::new(&event.event_type).is_marriage())
            .map(|event| MarriageFact {
                date: event.date.clone(),
                place: event
                    .place
                    .as_ref()
                    .and_then(|p| place_names.get(p))
                    .cloned(),
            });
        families.push(raw);
    }

    resolve_families(&mut persons, &families, &mut report);

    // Event participants come from the person-side references.
    let mut participants: BTreeMap<String, Vec<CrId>> = BTreeMap::new();
    for gramps_person in document.persons.values() {
        let Some(person_id) = CrId::new(&gramps_person.handle) else {
            continue;
        };
        for event_handle in &gramps_person.event_refs {
            participants
                .entry(event_handle.clone())
                .or_default()
                .push(person_id.clone());
        }
    }
    let events: Vec<Event> = document
        .events
        .values()
        .filter_map(|gramps_event| {
            let cr_id = CrId::new(&gramps_event.handle)?;
            let mut event = Event::new(cr_id, EventType::new(&gramps_event.event_type));
            event.date = gramps_event.date.clone();
            event.place = gramps_event.place.clone();
            event.description = gramps_event.description.clone();
            if let Some(people) = participants.get(&gramps_event.handle) {
                for person in people {
                    event.add_person(person.clone());
                }
            }
            Some(event)
        })
        .collect();

    let places = parser::canonical_places(&document);

    let citations: Vec<Citation> = document
        .citations
        .values()
        .map(|c| {
            let mut citation = Citation::new(&c.handle);
            citation.source_id = c.source.clone();
            citation.page = c.page.clone();
            citation.date = c.date.clone();
            citation.confidence = Confidence::from_gramps(c.confidence);
            citation
        })
        .collect();

    let mut summary = ImportSummary {
        persons: persons.len(),
        families: families.len(),
        events: events.len(),
        places: places.len(),
        citations: citations.len(),
        ..Default::default()
    };
    summary.record_report(&report);

    Ok(CanonicalImport {
        persons,
        events,
        places,
        citations,
        report,
        summary,
    })
}
