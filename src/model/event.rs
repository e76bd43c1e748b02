//! Events with zero or more participants.

use serde::{Deserialize, Serialize};

use crate::id::CrId;

/// Open event-type vocabulary.
///
/// Internally any string is a valid type; on export the type is matched
/// case-insensitively against the target format's fixed vocabulary, and
/// unmatched types pass through as custom events with a lossy-mapping warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(raw: impl Into<String>) -> Self {
        EventType(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map to the Gramps event-type vocabulary, if this type has an equivalent.
    pub fn to_gramps(&self) -> Option<&'static str> {
        match self.0.trim().to_ascii_lowercase().as_str() {
            "birth" => Some("Birth"),
            "death" => Some("Death"),
            "burial" => Some("Burial"),
            "marriage" | "wedding" => Some("Marriage"),
            "divorce" => Some("Divorce"),
            "occupation" => Some("Occupation"),
            "residence" => Some("Residence"),
            "census" => Some("Census"),
            _ => None,
        }
    }

    /// Map to the GEDCOM tag vocabulary, if this type has an equivalent.
    pub fn to_gedcom(&self) -> Option<&'static str> {
        match self.0.trim().to_ascii_lowercase().as_str() {
            "birth" => Some("BIRT"),
            "death" => Some("DEAT"),
            "burial" => Some("BURI"),
            "marriage" | "wedding" => Some("MARR"),
            "divorce" => Some("DIV"),
            "occupation" => Some("OCCU"),
            "residence" => Some("RESI"),
            "census" => Some("CENS"),
            _ => None,
        }
    }

    /// Whether this is a marriage-type event (drives spouse registration).
    pub fn is_marriage(&self) -> bool {
        matches!(
            self.0.trim().to_ascii_lowercase().as_str(),
            "marriage" | "wedding"
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A life event.
///
/// `persons` is a list: an event may have zero, one, or many participants.
/// This supersedes an earlier one-participant-only shape — all consumers must
/// accept the list form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub cr_id: CrId,
    pub event_type: EventType,
    pub date: Option<String>,
    /// Reference into the place set.
    pub place: Option<String>,
    pub persons: Vec<CrId>,
    pub description: Option<String>,
}

impl Event {
    pub fn new(cr_id: CrId, event_type: EventType) -> Self {
        Self {
            cr_id,
            event_type,
            date: None,
            place: None,
            persons: Vec::new(),
            description: None,
        }
    }

    /// Register a participant, idempotently.
    pub fn add_person(&mut self, person: CrId) {
        if !self.persons.contains(&person) {
            self.persons.push(person);
        }
    }
}
