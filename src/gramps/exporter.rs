//! Gramps XML export: the inverse of the resolver.
//!
//! Families are re-derived from the person set by
//! [`crate::export::families::synthesize_families`]; this module owns only the
//! Gramps-specific serialization. Handles are assigned to every person and
//! family **before** any XML is emitted, because person records carry
//! `childof`/`parentin` back-references to family handles that must already
//! exist when the person element is written.

use std::collections::BTreeMap;

use crate::error::ExportError;
use crate::export::dates::{normalize, DateForm};
use crate::export::families::synthesize_families;
use crate::export::privacy::{self, PrivacyOptions};
use crate::graph::FamilyGraph;
use crate::id::CrId;
use crate::model::place::hierarchy_name;
use crate::model::{ChildLink, Event, FamilyView, Pedigree, Place};
use crate::report::{Diagnostic, ExportSummary};

use super::xml::XmlBuilder;

const XMLNS: &str = "http://gramps-project.org/xml/1.7.1/";

/// Options for a Gramps export run.
#[derive(Debug, Clone, Default)]
pub struct GrampsExportOptions {
    pub privacy: PrivacyOptions,
}

/// An event planned for emission, with its handle already assigned.
struct PlannedEvent {
    handle: String,
    event_type: String,
    date: Option<String>,
    place: Option<String>,
    description: Option<String>,
}

/// Registry mapping free-text place names to place handles, creating
/// synthetic place records for names with no existing match.
struct PlaceRegistry {
    places: BTreeMap<String, Place>,
    /// Lowercased name and hierarchy-name index into `places`.
    name_index: BTreeMap<String, String>,
    next_synthetic: usize,
}

impl PlaceRegistry {
    fn build(places: &BTreeMap<String, Place>) -> Self {
        let mut name_index = BTreeMap::new();
        for (id, place) in places {
            name_index.insert(place.name.to_lowercase(), id.clone());
            if let Some(full) = hierarchy_name(places, id) {
                name_index.insert(full.to_lowercase(), id.clone());
            }
        }
        Self {
            places: places.clone(),
            name_index,
            next_synthetic: 0,
        }
    }

    fn handle_for(&mut self, text: &str) -> String {
        if let Some(handle) = self.name_index.get(&text.to_lowercase()) {
            return handle.clone();
        }
        let handle = format!("_plc{:04}", self.next_synthetic);
        self.next_synthetic += 1;
        self.places
            .insert(handle.clone(), Place::new(&handle, text));
        self.name_index.insert(text.to_lowercase(), handle.clone());
        handle
    }
}

fn person_handle(id: &CrId) -> String {
    let raw = id.as_str();
    if raw.starts_with('_') {
        raw.to_owned()
    } else {
        format!("_{raw}")
    }
}

fn split_name(name: &str) -> (Option<&str>, Option<&str>) {
    match name.rsplit_once(' ') {
        Some((first, surname)) => (Some(first.trim()), Some(surname.trim())),
        None if name.trim().is_empty() => (None, None),
        None => (Some(name.trim()), None),
    }
}

/// Export the canonical graph as a Gramps XML document.
pub fn export(
    graph: &FamilyGraph,
    events: &[Event],
    places: &BTreeMap<String, Place>,
    options: &GrampsExportOptions,
) -> Result<(String, ExportSummary), ExportError> {
    let persons = graph.snapshot();
    if persons.is_empty() {
        return Err(ExportError::EmptyGraph);
    }
    let (persons, excluded) = privacy::apply_policy(&persons, &options.privacy);
    let mut events: Vec<Event> = events.to_vec();
    privacy::prune_events(&mut events, &persons);

    let synthesis = synthesize_families(&persons);
    let mut warnings: Vec<Diagnostic> = synthesis.warnings.clone();
    let families = &synthesis.families;

    // -- Handle assignment, before any emission. --
    let mut person_gid: BTreeMap<CrId, String> = BTreeMap::new();
    for (i, id) in persons.keys().enumerate() {
        person_gid.insert(id.clone(), format!("I{i:04}"));
    }
    let family_handles: Vec<String> = (0..families.len())
        .map(|i| format!("_fam{i:04}"))
        .collect();

    let mut childof: BTreeMap<CrId, Vec<String>> = BTreeMap::new();
    let mut parentin: BTreeMap<CrId, Vec<String>> = BTreeMap::new();
    for (family, handle) in families.iter().zip(&family_handles) {
        for parent in family.father.iter().chain(family.mother.iter()) {
            parentin.entry(parent.clone()).or_default().push(handle.clone());
        }
        for child in &family.children {
            childof
                .entry(child.child.clone())
                .or_default()
                .push(handle.clone());
        }
    }

    // -- Event planning. --
    let mut registry = PlaceRegistry::build(places);
    let mut planned: Vec<PlannedEvent> = Vec::new();
    let mut person_eventrefs: BTreeMap<CrId, Vec<String>> = BTreeMap::new();
    let mut family_eventrefs: Vec<Option<String>> = vec![None; families.len()];

    for (i, (id, person)) in persons.iter().enumerate() {
        let mut push_vital = |suffix: &str,
                              event_type: &str,
                              date: &Option<String>,
                              place: &Option<String>,
                              description: Option<String>,
                              planned: &mut Vec<PlannedEvent>,
                              registry: &mut PlaceRegistry| {
            if date.is_none() && place.is_none() && description.is_none() {
                return;
            }
            let handle = format!("_ev{suffix}{i:04}");
            planned.push(PlannedEvent {
                handle: handle.clone(),
                event_type: event_type.to_owned(),
                date: date.clone(),
                place: place.as_ref().map(|p| registry.handle_for(p)),
                description,
            });
            person_eventrefs.entry(id.clone()).or_default().push(handle);
        };
        push_vital("b", "Birth", &person.birth_date, &person.birth_place, None, &mut planned, &mut registry);
        push_vital("d", "Death", &person.death_date, &person.death_place, None, &mut planned, &mut registry);
        push_vital("y", "Burial", &None, &person.burial_place, None, &mut planned, &mut registry);
        push_vital(
            "o",
            "Occupation",
            &None,
            &None,
            person.occupation.clone(),
            &mut planned,
            &mut registry,
        );
    }

    for (fi, family) in families.iter().enumerate() {
        if let Some(marriage) = &family.marriage {
            let handle = format!("_evm{fi:04}");
            planned.push(PlannedEvent {
                handle: handle.clone(),
                event_type: "Marriage".to_owned(),
                date: marriage.date.clone(),
                place: marriage.place.as_ref().map(|p| registry.handle_for(p)),
                description: None,
            });
            family_eventrefs[fi] = Some(handle);
        }
    }

    for event in &events {
        let event_type = match event.event_type.to_gramps() {
            Some(mapped) => mapped.to_owned(),
            None => {
                warnings.push(Diagnostic::warning(
                    event.cr_id.as_str(),
                    format!(
                        "event type \"{}\" has no Gramps equivalent, exported as custom type",
                        event.event_type
                    ),
                ));
                event.event_type.as_str().to_owned()
            }
        };
        let place = match &event.place {
            Some(place_id) if registry.places.contains_key(place_id) => Some(place_id.clone()),
            Some(place_id) => {
                warnings.push(Diagnostic::warning(
                    event.cr_id.as_str(),
                    format!("place reference {place_id} not found, dropped"),
                ));
                None
            }
            None => None,
        };
        let handle = person_handle(&event.cr_id);
        for participant in &event.persons {
            person_eventrefs
                .entry(participant.clone())
                .or_default()
                .push(handle.clone());
        }
        planned.push(PlannedEvent {
            handle,
            event_type,
            date: event.date.clone(),
            place,
            description: event.description.clone(),
        });
    }

    // -- Emission. --
    let mut xml = XmlBuilder::new();
    xml.open("database", &[("xmlns", XMLNS)]);

    xml.open("events", &[]);
    for event in &planned {
        xml.open("event", &[("handle", event.handle.as_str())]);
        xml.text_element("type", &event.event_type);
        if let Some(date) = &event.date {
            emit_date(&mut xml, date);
        }
        if let Some(place) = &event.place {
            xml.empty("place", &[("hlink", place)]);
        }
        if let Some(description) = &event.description {
            xml.text_element("description", description);
        }
        xml.close("event");
    }
    xml.close("events");

    xml.open("people", &[]);
    for (id, person) in &persons {
        let handle = person_handle(id);
        xml.open(
            "person",
            &[("handle", handle.as_str()), ("id", person_gid[id].as_str())],
        );
        xml.text_element("gender", person.sex.as_letter());
        let (first, surname) = split_name(&person.name);
        xml.open("name", &[("type", "Birth Name")]);
        if let Some(first) = first {
            xml.text_element("first", first);
        }
        if let Some(surname) = surname {
            xml.text_element("surname", surname);
        }
        xml.close("name");
        for eventref in person_eventrefs.get(id).into_iter().flatten() {
            xml.empty("eventref", &[("hlink", eventref), ("role", "Primary")]);
        }
        for family in childof.get(id).into_iter().flatten() {
            xml.empty("childof", &[("hlink", family)]);
        }
        for family in parentin.get(id).into_iter().flatten() {
            xml.empty("parentin", &[("hlink", family)]);
        }
        xml.close("person");
    }
    xml.close("people");

    xml.open("families", &[]);
    for (fi, (family, handle)) in families.iter().zip(&family_handles).enumerate() {
        xml.open(
            "family",
            &[("handle", handle.as_str()), ("id", &format!("F{fi:04}"))],
        );
        if family.father.is_some() && family.mother.is_some() {
            xml.empty("rel", &[("type", "Married")]);
        }
        if let Some(father) = &family.father {
            xml.empty("father", &[("hlink", &person_handle(father))]);
        }
        if let Some(mother) = &family.mother {
            xml.empty("mother", &[("hlink", &person_handle(mother))]);
        }
        if let Some(eventref) = &family_eventrefs[fi] {
            xml.empty("eventref", &[("hlink", eventref), ("role", "Family")]);
        }
        for child in &family.children {
            emit_childref(&mut xml, family, child);
        }
        xml.close("family");
    }
    xml.close("families");

    xml.open("places", &[]);
    for (place_id, place) in &registry.places {
        xml.open(
            "placeobj",
            &[
                ("handle", place_id.as_str()),
                ("type", place.place_type.as_str()),
            ],
        );
        xml.empty("pname", &[("value", &place.name)]);
        if let (Some(lat), Some(long)) = (place.latitude, place.longitude) {
            xml.empty(
                "coord",
                &[("lat", &lat.to_string()), ("long", &long.to_string())],
            );
        }
        if let Some(parent) = &place.parent_id {
            xml.empty("placeref", &[("hlink", parent)]);
        }
        xml.close("placeobj");
    }
    xml.close("places");

    xml.close("database");

    let summary = ExportSummary {
        persons: persons.len(),
        families: families.len(),
        events: planned.len(),
        excluded,
        warnings,
    };
    tracing::info!(%summary, "gramps export complete");
    Ok((xml.finish(), summary))
}

/// Dates fall through ISO → free-text; never dropped.
fn emit_date(xml: &mut XmlBuilder, raw: &str) {
    match normalize(raw) {
        Some(DateForm::Iso(iso)) => xml.empty("dateval", &[("val", &iso)]),
        Some(DateForm::Text(text)) => xml.empty("datestr", &[("val", &text)]),
        None => {}
    }
}

/// A `frel`/`mrel` attribute is only written for non-default qualifiers on a
/// present parent side.
fn emit_childref(xml: &mut XmlBuilder, family: &FamilyView, child: &ChildLink) {
    let handle = person_handle(&child.child);
    let mut attrs: Vec<(&str, &str)> = vec![("hlink", handle.as_str())];
    let frel = child.father_rel.as_gramps();
    let mrel = child.mother_rel.as_gramps();
    if family.father.is_some() && child.father_rel != Pedigree::Birth {
        attrs.push(("frel", frel));
    }
    if family.mother.is_some() && child.mother_rel != Pedigree::Birth {
        attrs.push(("mrel", mrel));
    }
    xml.empty("childref", &attrs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Person, Sex};

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    fn family_graph() -> FamilyGraph {
        let mut f = Person::new(id("f01"), "John Doe").with_sex(Sex::Male);
        let mut m = Person::new(id("m01"), "Jane Roe").with_sex(Sex::Female);
        let mut c = Person::new(id("c01"), "Kid Doe");
        f.death_date = Some("1950-03-02".into());
        m.death_date = Some("1960".into());
        c.death_date = Some("1999".into());
        c.father = Some(id("f01"));
        c.mother = Some(id("m01"));
        f.children = vec![id("c01")];
        m.children = vec![id("c01")];
        f.add_spouse(id("m01"));
        m.add_spouse(id("f01"));
        FamilyGraph::from_persons(vec![f, m, c]).unwrap()
    }

    #[test]
    fn exports_people_families_and_backrefs() {
        let (xml, summary) = export(
            &family_graph(),
            &[],
            &BTreeMap::new(),
            &GrampsExportOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.persons, 3);
        assert_eq!(summary.families, 1);
        assert!(xml.contains(r#"<person handle="_f01""#));
        assert!(xml.contains(r#"<father hlink="_f01"/>"#));
        assert!(xml.contains(r#"<mother hlink="_m01"/>"#));
        assert!(xml.contains(r#"<childref hlink="_c01"/>"#));
        assert!(xml.contains(r#"<childof hlink="_fam0000"/>"#));
        assert!(xml.contains(r#"<parentin hlink="_fam0000"/>"#));
    }

    #[test]
    fn empty_graph_is_an_error() {
        let graph = FamilyGraph::new();
        assert!(matches!(
            export(&graph, &[], &BTreeMap::new(), &GrampsExportOptions::default()),
            Err(ExportError::EmptyGraph)
        ));
    }

    #[test]
    fn iso_and_free_text_dates_both_survive() {
        let (xml, _) = export(
            &family_graph(),
            &[],
            &BTreeMap::new(),
            &GrampsExportOptions::default(),
        )
        .unwrap();
        assert!(xml.contains(r#"<dateval val="1950-03-02"/>"#));

        let mut p = Person::new(id("a1"), "Anna Lee");
        p.birth_date = Some("about springtime 1850".into());
        p.death_date = Some("1900".into());
        let graph = FamilyGraph::from_persons(vec![p]).unwrap();
        let (xml, _) = export(&graph, &[], &BTreeMap::new(), &GrampsExportOptions::default())
            .unwrap();
        assert!(xml.contains(r#"<datestr val="about springtime 1850"/>"#));
    }

    #[test]
    fn unknown_event_type_warns_but_exports() {
        let mut event = Event::new(id("e99"), crate::model::EventType::new("bar mitzvah"));
        event.add_person(id("f01"));
        let (xml, summary) = export(
            &family_graph(),
            &[event],
            &BTreeMap::new(),
            &GrampsExportOptions::default(),
        )
        .unwrap();
        assert!(xml.contains("<type>bar mitzvah</type>"));
        assert!(summary
            .warnings
            .iter()
            .any(|w| w.message.contains("no Gramps equivalent")));
    }

    #[test]
    fn free_text_place_becomes_a_placeobj() {
        let mut p = Person::new(id("a1"), "Anna Lee");
        p.birth_date = Some("1850".into());
        p.birth_place = Some("Springfield".into());
        p.death_date = Some("1900".into());
        let graph = FamilyGraph::from_persons(vec![p]).unwrap();
        let (xml, _) = export(&graph, &[], &BTreeMap::new(), &GrampsExportOptions::default())
            .unwrap();
        assert!(xml.contains(r#"<pname value="Springfield"/>"#));
        assert!(xml.contains(r#"<place hlink="_plc0000"/>"#));
    }

    #[test]
    fn excluded_living_persons_leave_no_dangling_refs() {
        let mut f = Person::new(id("f01"), "John Doe").with_sex(Sex::Male);
        f.death_date = Some("1950".into());
        let mut kid = Person::new(id("k01"), "Living Kid");
        kid.birth_date = Some("2000".into());
        kid.father = Some(id("f01"));
        f.children = vec![id("k01")];
        let graph = FamilyGraph::from_persons(vec![f, kid]).unwrap();

        let options = GrampsExportOptions {
            privacy: PrivacyOptions {
                enabled: true,
                policy: privacy::LivingPolicy::Exclude,
                living_cutoff_years: 110,
                reference_year: Some(2020),
            },
        };
        let (xml, summary) = export(&graph, &[], &BTreeMap::new(), &options).unwrap();
        assert_eq!(summary.excluded, 1);
        assert!(!xml.contains("k01"));
        assert!(!xml.contains("childref"));
    }
}
