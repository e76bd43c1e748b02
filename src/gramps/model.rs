//! Gramps XML document model.
//!
//! Every entity is addressed by an opaque `handle` string local to the
//! document. The maps are ordered by handle so downstream passes (resolution,
//! canonical conversion) are deterministic.

use std::collections::BTreeMap;

use crate::model::Sex;

/// A parsed Gramps database, broken into per-collection maps keyed by handle.
#[derive(Debug, Clone, Default)]
pub struct GrampsDocument {
    pub notes: BTreeMap<String, GrampsNote>,
    pub repositories: BTreeMap<String, GrampsRepository>,
    pub places: BTreeMap<String, GrampsPlace>,
    pub events: BTreeMap<String, GrampsEvent>,
    pub sources: BTreeMap<String, GrampsSource>,
    pub citations: BTreeMap<String, GrampsCitation>,
    pub objects: BTreeMap<String, GrampsObject>,
    pub persons: BTreeMap<String, GrampsPerson>,
    pub families: BTreeMap<String, GrampsFamily>,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsNote {
    pub handle: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsRepository {
    pub handle: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsPlace {
    pub handle: String,
    pub name: String,
    pub place_type: Option<String>,
    /// Enclosing place handle.
    pub parent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsEvent {
    pub handle: String,
    pub event_type: String,
    pub date: Option<String>,
    pub place: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsSource {
    pub handle: String,
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsCitation {
    pub handle: String,
    pub source: Option<String>,
    pub page: Option<String>,
    pub date: Option<String>,
    /// Raw 0–4 confidence integer.
    pub confidence: u8,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsObject {
    pub handle: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GrampsPerson {
    pub handle: String,
    /// The human-facing Gramps id (`I0001`), if present.
    pub gramps_id: Option<String>,
    pub name: String,
    pub sex: Sex,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_place: Option<String>,
    pub burial_place: Option<String>,
    pub occupation: Option<String>,
    /// Event handles referenced by this person.
    pub event_refs: Vec<String>,
    pub citation_refs: Vec<String>,
}

/// One `<childref>` with its per-side relationship qualifiers.
#[derive(Debug, Clone)]
pub struct GrampsChildRef {
    pub hlink: String,
    /// `frel` attribute: relationship to the father. Absent means Birth.
    pub frel: Option<String>,
    /// `mrel` attribute: relationship to the mother. Absent means Birth.
    pub mrel: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GrampsFamily {
    pub handle: String,
    pub gramps_id: Option<String>,
    pub father: Option<String>,
    pub mother: Option<String>,
    pub children: Vec<GrampsChildRef>,
    pub event_refs: Vec<String>,
}
