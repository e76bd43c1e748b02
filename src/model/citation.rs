//! Source citations and confidence mapping.

use serde::{Deserialize, Serialize};

/// Internal three-level confidence scale.
///
/// Gramps stores citation confidence as an integer 0–4; the fixed threshold
/// table is ≥3 → High, =2 → Medium, ≤1 → Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Map a Gramps 0–4 confidence integer onto the internal scale.
    pub fn from_gramps(raw: u8) -> Self {
        match raw {
            n if n >= 3 => Confidence::High,
            2 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    /// Map back to the Gramps integer (the canonical representative per level).
    pub fn to_gramps(self) -> u8 {
        match self {
            Confidence::High => 4,
            Confidence::Medium => 2,
            Confidence::Low => 1,
        }
    }
}

/// A citation: a pointer from data to a source, with confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    /// Reference into the source set.
    pub source_id: Option<String>,
    pub page: Option<String>,
    pub date: Option<String>,
    pub confidence: Confidence,
}

impl Citation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: None,
            page: None,
            date: None,
            confidence: Confidence::Low,
        }
    }
}
