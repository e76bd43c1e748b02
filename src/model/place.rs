//! Places with a single-parent hierarchy.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Enumerated place granularity, inferable from name or hierarchy when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceType {
    Country,
    State,
    County,
    City,
    Town,
    Village,
    Parish,
    Cemetery,
    Church,
    Address,
    #[default]
    Unknown,
}

impl PlaceType {
    /// Infer a type from the place name when none is recorded.
    ///
    /// Heuristic keyword match; falls back to `Unknown`.
    pub fn infer_from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("cemetery") || lower.contains("graveyard") {
            PlaceType::Cemetery
        } else if lower.contains("church") || lower.contains("cathedral") || lower.contains("chapel")
        {
            PlaceType::Church
        } else if lower.contains("county") {
            PlaceType::County
        } else if lower.contains("parish") {
            PlaceType::Parish
        } else {
            PlaceType::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaceType::Country => "country",
            PlaceType::State => "state",
            PlaceType::County => "county",
            PlaceType::City => "city",
            PlaceType::Town => "town",
            PlaceType::Village => "village",
            PlaceType::Parish => "parish",
            PlaceType::Cemetery => "cemetery",
            PlaceType::Church => "church",
            PlaceType::Address => "address",
            PlaceType::Unknown => "unknown",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" => PlaceType::Country,
            "state" | "province" => PlaceType::State,
            "county" => PlaceType::County,
            "city" => PlaceType::City,
            "town" => PlaceType::Town,
            "village" | "hamlet" => PlaceType::Village,
            "parish" => PlaceType::Parish,
            "cemetery" | "graveyard" => PlaceType::Cemetery,
            "church" => PlaceType::Church,
            "address" | "street" => PlaceType::Address,
            _ => PlaceType::Unknown,
        }
    }
}

/// A place in the single-parent hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    /// Enclosing place, if any. The hierarchy can be malformed by bad imports;
    /// every ancestry walk carries a visited set and breaks cycles.
    pub parent_id: Option<String>,
    pub place_type: PlaceType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let place_type = PlaceType::infer_from_name(&name);
        Self {
            id: id.into(),
            name,
            parent_id: None,
            place_type,
            latitude: None,
            longitude: None,
        }
    }
}

/// Build the full hierarchical name for a place ("Springfield, Sangamon
/// County, Illinois"), walking parents up to the root.
///
/// A cycle in the hierarchy terminates the walk and returns the partial chain
/// collected so far.
pub fn hierarchy_name(places: &BTreeMap<String, Place>, id: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = places.get(id)?;

    loop {
        if !seen.insert(current.id.as_str()) {
            tracing::warn!(place = %current.id, "cycle in place hierarchy, truncating chain");
            break;
        }
        parts.push(current.name.as_str());
        match current.parent_id.as_deref().and_then(|pid| places.get(pid)) {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Some(parts.join(", "))
}
