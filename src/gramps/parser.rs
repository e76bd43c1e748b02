//! Gramps XML parser.
//!
//! Parsing is multi-stage and order-dependent within a single pass: notes,
//! repositories, places, events, sources, citations, and media objects are
//! materialized before persons and families, so embedded reference lookups
//! (a person's birth event, an event's place) resolve during the same forward
//! pass without a second document traversal.
//!
//! Failure policy: a document without a `<database>` root is a hard parse
//! failure. Everything else accumulates: a person or family without its
//! required handle is an error diagnostic (the parse reports invalid but keeps
//! enumerating), a missing optional attribute is a warning.

use std::collections::BTreeMap;

use crate::error::GrampsError;
use crate::model::place::{hierarchy_name, Place, PlaceType};
use crate::model::Sex;
use crate::report::ParseReport;

use super::model::*;
use super::xml::{parse_tree, XmlElement};

/// A parsed document plus the full diagnostic list.
///
/// Callers must check `report.valid()` before committing any of the parsed
/// data.
#[derive(Debug)]
pub struct ParsedGramps {
    pub document: GrampsDocument,
    pub report: ParseReport,
}

/// Parse Gramps XML text.
pub fn parse(xml: &str) -> Result<ParsedGramps, GrampsError> {
    let root = parse_tree(xml)?;
    if root.name != "database" {
        return Err(GrampsError::Malformed {
            message: format!("expected <database> root, found <{}>", root.name),
        });
    }

    let mut document = GrampsDocument::default();
    let mut report = ParseReport::new();

    // Stage order is load-bearing: each stage may look up entities from the
    // stages before it.
    parse_notes(&root, &mut document, &mut report);
    parse_repositories(&root, &mut document, &mut report);
    parse_places(&root, &mut document, &mut report);
    parse_events(&root, &mut document, &mut report);
    parse_sources(&root, &mut document, &mut report);
    parse_citations(&root, &mut document, &mut report);
    parse_objects(&root, &mut document, &mut report);
    parse_people(&root, &mut document, &mut report);
    parse_families(&root, &mut document, &mut report);

    tracing::info!(
        persons = document.persons.len(),
        families = document.families.len(),
        events = document.events.len(),
        places = document.places.len(),
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "gramps document parsed"
    );

    Ok(ParsedGramps { document, report })
}

fn collection<'a>(
    root: &'a XmlElement,
    name: &'a str,
    item: &'a str,
) -> impl Iterator<Item = (usize, &'a XmlElement)> {
    root.child(name)
        .into_iter()
        .flat_map(move |c| c.children_named(item))
        .enumerate()
}

/// Read the required handle attribute, or accumulate an error.
fn require_handle(
    element: &XmlElement,
    path: String,
    report: &mut ParseReport,
) -> Option<String> {
    match element.attr("handle").filter(|h| !h.trim().is_empty()) {
        Some(handle) => Some(handle.to_owned()),
        None => {
            report.error(path, format!("<{}> has no handle", element.name));
            None
        }
    }
}

fn parse_notes(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "notes", "note") {
        let Some(handle) = require_handle(element, format!("notes/note[{i}]"), report) else {
            continue;
        };
        let text = element.child_text("text").unwrap_or_default();
        document.notes.insert(handle.clone(), GrampsNote { handle, text });
    }
}

fn parse_repositories(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "repositories", "repository") {
        let Some(handle) =
            require_handle(element, format!("repositories/repository[{i}]"), report)
        else {
            continue;
        };
        let name = element
            .child("rname")
            .and_then(|r| r.attr("value").map(str::to_owned))
            .or_else(|| element.child_text("rname"))
            .unwrap_or_default();
        document
            .repositories
            .insert(handle.clone(), GrampsRepository { handle, name });
    }
}

fn parse_places(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "places", "placeobj") {
        let Some(handle) = require_handle(element, format!("places/placeobj[{i}]"), report)
        else {
            continue;
        };
        let name = element
            .child("pname")
            .and_then(|p| p.attr("value").map(str::to_owned))
            .or_else(|| element.child_text("ptitle"))
            .unwrap_or_default();
        if name.is_empty() {
            report.warning(format!("places/placeobj[{i}]"), "place has no name");
        }
        let coord = element.child("coord");
        document.places.insert(
            handle.clone(),
            GrampsPlace {
                handle,
                name,
                place_type: element.attr("type").map(str::to_owned),
                parent: element
                    .child("placeref")
                    .and_then(|p| p.attr("hlink").map(str::to_owned)),
                latitude: coord.and_then(|c| c.attr("lat")).and_then(|v| v.parse().ok()),
                longitude: coord.and_then(|c| c.attr("long")).and_then(|v| v.parse().ok()),
            },
        );
    }
}

fn parse_events(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "events", "event") {
        let Some(handle) = require_handle(element, format!("events/event[{i}]"), report) else {
            continue;
        };
        let date = element
            .child("dateval")
            .or_else(|| element.child("datestr"))
            .and_then(|d| d.attr("val").map(str::to_owned));
        let place = element
            .child("place")
            .and_then(|p| p.attr("hlink").map(str::to_owned));
        if let Some(place_ref) = &place {
            if !document.places.contains_key(place_ref) {
                report.warning(
                    format!("events/event[{i}]"),
                    format!("place reference {place_ref} not found"),
                );
            }
        }
        document.events.insert(
            handle.clone(),
            GrampsEvent {
                handle,
                event_type: element.child_text("type").unwrap_or_default(),
                date,
                place,
                description: element.child_text("description"),
            },
        );
    }
}

fn parse_sources(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "sources", "source") {
        let Some(handle) = require_handle(element, format!("sources/source[{i}]"), report) else {
            continue;
        };
        document.sources.insert(
            handle.clone(),
            GrampsSource {
                handle,
                title: element.child_text("stitle"),
                author: element.child_text("sauthor"),
            },
        );
    }
}

fn parse_citations(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "citations", "citation") {
        let Some(handle) = require_handle(element, format!("citations/citation[{i}]"), report)
        else {
            continue;
        };
        let source = element
            .child("sourceref")
            .and_then(|s| s.attr("hlink").map(str::to_owned));
        if let Some(source_ref) = &source {
            if !document.sources.contains_key(source_ref) {
                report.warning(
                    format!("citations/citation[{i}]"),
                    format!("source reference {source_ref} not found"),
                );
            }
        }
        // Gramps defaults citation confidence to 2 (normal).
        let confidence = element
            .child_text("confidence")
            .and_then(|c| c.parse().ok())
            .unwrap_or(2);
        document.citations.insert(
            handle.clone(),
            GrampsCitation {
                handle,
                source,
                page: element.child_text("page"),
                date: element
                    .child("dateval")
                    .and_then(|d| d.attr("val").map(str::to_owned)),
                confidence,
            },
        );
    }
}

fn parse_objects(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "objects", "object") {
        let Some(handle) = require_handle(element, format!("objects/object[{i}]"), report) else {
            continue;
        };
        document.objects.insert(
            handle.clone(),
            GrampsObject {
                handle,
                file: element
                    .child("file")
                    .and_then(|f| f.attr("src").map(str::to_owned)),
            },
        );
    }
}

/// Convert the raw place collection to canonical [`Place`] records.
pub(crate) fn canonical_places(document: &GrampsDocument) -> BTreeMap<String, Place> {
    document
        .places
        .values()
        .map(|p| {
            let mut place = Place::new(&p.handle, &p.name);
            place.parent_id = p.parent.clone();
            place.place_type = p
                .place_type
                .as_deref()
                .map(PlaceType::from_str_loose)
                .unwrap_or(place.place_type);
            place.latitude = p.latitude;
            place.longitude = p.longitude;
            (p.handle.clone(), place)
        })
        .collect()
}

/// Display names for place handles, with the enclosing hierarchy flattened.
pub(crate) fn place_names(document: &GrampsDocument) -> BTreeMap<String, String> {
    let places = canonical_places(document);
    document
        .places
        .keys()
        .filter_map(|handle| hierarchy_name(&places, handle).map(|name| (handle.clone(), name)))
        .collect()
}

fn parse_people(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    let names = place_names(document);

    for (i, element) in collection(root, "people", "person") {
        let path = format!("people/person[{i}]");
        let Some(handle) = require_handle(element, path.clone(), report) else {
            continue;
        };

        let sex = match element.child_text("gender") {
            Some(g) => Sex::from_letter(&g),
            None => {
                report.warning(&path, "person has no gender");
                Sex::Unknown
            }
        };

        let name = element
            .child("name")
            .map(|n| {
                let first = n.child_text("first").unwrap_or_default();
                let surname = n.child_text("surname").unwrap_or_default();
                match (first.is_empty(), surname.is_empty()) {
                    (false, false) => format!("{first} {surname}"),
                    (false, true) => first,
                    (true, false) => surname,
                    (true, true) => String::new(),
                }
            })
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                report.warning(&path, "person has no name");
                handle.clone()
            });

        let mut person = GrampsPerson {
            handle: handle.clone(),
            gramps_id: element.attr("id").map(str::to_owned),
            name,
            sex,
            birth_date: None,
            death_date: None,
            birth_place: None,
            death_place: None,
            burial_place: None,
            occupation: None,
            event_refs: Vec::new(),
            citation_refs: Vec::new(),
        };

        // Vital fields resolve against the event map built earlier in this
        // same pass.
        for eventref in element.children_named("eventref") {
            let Some(hlink) = eventref.attr("hlink") else {
                continue;
            };
            person.event_refs.push(hlink.to_owned());
            let Some(event) = document.events.get(hlink) else {
                report.warning(&path, format!("event reference {hlink} not found"));
                continue;
            };
            let place = event.place.as_ref().and_then(|p| names.get(p)).cloned();
            match event.event_type.as_str() {
                "Birth" => {
                    person.birth_date = event.date.clone();
                    person.birth_place = place;
                }
                "Death" => {
                    person.death_date = event.date.clone();
                    person.death_place = place;
                }
                "Burial" => person.burial_place = place,
                "Occupation" => person.occupation = event.description.clone(),
                _ => {}
            }
        }
        for citationref in element.children_named("citationref") {
            if let Some(hlink) = citationref.attr("hlink") {
                person.citation_refs.push(hlink.to_owned());
            }
        }

        document.persons.insert(handle, person);
    }
}

fn parse_families(root: &XmlElement, document: &mut GrampsDocument, report: &mut ParseReport) {
    for (i, element) in collection(root, "families", "family") {
        let path = format!("families/family[{i}]");
        let Some(handle) = require_handle(element, path.clone(), report) else {
            continue;
        };

        let parent_ref = |name: &str| -> Option<String> {
            element.child(name).and_then(|p| p.attr("hlink").map(str::to_owned))
        };
        let father = parent_ref("father");
        let mother = parent_ref("mother");
        for (side, parent) in [("father", &father), ("mother", &mother)] {
            if let Some(hlink) = parent {
                if !document.persons.contains_key(hlink) {
                    report.warning(&path, format!("{side} reference {hlink} not found"));
                }
            }
        }

        let mut children = Vec::new();
        for childref in element.children_named("childref") {
            let Some(hlink) = childref.attr("hlink") else {
                report.warning(&path, "<childref> has no hlink");
                continue;
            };
            children.push(GrampsChildRef {
                hlink: hlink.to_owned(),
                frel: childref.attr("frel").map(str::to_owned),
                mrel: childref.attr("mrel").map(str::to_owned),
            });
        }

        let event_refs = element
            .children_named("eventref")
            .filter_map(|e| e.attr("hlink").map(str::to_owned))
            .collect();

        document.families.insert(
            handle.clone(),
            GrampsFamily {
                handle,
                gramps_id: element.attr("id").map(str::to_owned),
                father,
                mother,
                children,
                event_refs,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<database xmlns="http://gramps-project.org/xml/1.7.1/">
  <events>
    <event handle="_e1" id="E0001">
      <type>Birth</type>
      <dateval val="1900-01-15"/>
      <place hlink="_p1"/>
    </event>
    <event handle="_e2" id="E0002">
      <type>Marriage</type>
      <dateval val="1925-06-01"/>
    </event>
  </events>
  <people>
    <person handle="_i1" id="I0001">
      <gender>M</gender>
      <name><first>John</first><surname>Doe</surname></name>
      <eventref hlink="_e1" role="Primary"/>
    </person>
    <person handle="_i2" id="I0002">
      <gender>F</gender>
      <name><first>Jane</first><surname>Roe</surname></name>
    </person>
    <person handle="_i3" id="I0003">
      <name><first>Kid</first></name>
    </person>
  </people>
  <families>
    <family handle="_f1" id="F0001">
      <father hlink="_i1"/>
      <mother hlink="_i2"/>
      <eventref hlink="_e2"/>
      <childref hlink="_i3" mrel="Stepchild"/>
    </family>
  </families>
  <places>
    <placeobj handle="_p1" type="City">
      <pname value="Springfield"/>
      <placeref hlink="_p2"/>
    </placeobj>
    <placeobj handle="_p2" type="State">
      <pname value="Illinois"/>
    </placeobj>
  </places>
  <citations>
    <citation handle="_c1">
      <page>p. 14</page>
      <confidence>4</confidence>
      <sourceref hlink="_s1"/>
    </citation>
  </citations>
  <sources>
    <source handle="_s1"><stitle>Registry</stitle></source>
  </sources>
</database>"#;

    #[test]
    fn parses_collections_keyed_by_handle() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(parsed.report.valid());
        assert_eq!(parsed.document.persons.len(), 3);
        assert_eq!(parsed.document.families.len(), 1);
        assert_eq!(parsed.document.events.len(), 2);
        assert_eq!(parsed.document.places.len(), 2);
    }

    #[test]
    fn person_vitals_resolve_through_events_and_places() {
        let parsed = parse(SAMPLE).unwrap();
        let john = &parsed.document.persons["_i1"];
        assert_eq!(john.name, "John Doe");
        assert_eq!(john.sex, Sex::Male);
        assert_eq!(john.birth_date.as_deref(), Some("1900-01-15"));
        assert_eq!(john.birth_place.as_deref(), Some("Springfield, Illinois"));
    }

    #[test]
    fn missing_gender_is_a_warning_not_an_error() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(parsed.report.valid());
        assert!(parsed
            .report
            .warnings()
            .any(|d| d.message.contains("no gender")));
        assert_eq!(parsed.document.persons["_i3"].sex, Sex::Unknown);
    }

    #[test]
    fn childref_qualifiers_are_kept_per_side() {
        let parsed = parse(SAMPLE).unwrap();
        let family = &parsed.document.families["_f1"];
        assert_eq!(family.children[0].mrel.as_deref(), Some("Stepchild"));
        assert_eq!(family.children[0].frel, None);
    }

    #[test]
    fn missing_handle_invalidates_but_keeps_enumerating() {
        let xml = r#"<database>
  <people>
    <person id="I0001"><gender>M</gender></person>
    <person handle="_i2"><gender>F</gender></person>
    <person id="I0003"></person>
  </people>
</database>"#;
        let parsed = parse(xml).unwrap();
        assert!(!parsed.report.valid());
        // Both bad records are reported, the good one is kept.
        assert_eq!(parsed.report.errors().count(), 2);
        assert_eq!(parsed.document.persons.len(), 1);
        assert!(parsed.document.persons.contains_key("_i2"));
    }

    #[test]
    fn wrong_root_is_a_hard_failure() {
        assert!(matches!(
            parse("<notadatabase></notadatabase>"),
            Err(GrampsError::Malformed { .. })
        ));
    }

    #[test]
    fn citation_confidence_parsed() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.document.citations["_c1"].confidence, 4);
    }
}
