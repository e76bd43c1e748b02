//! Derived family records.
//!
//! Families are a view, not a stored entity: they are synthesized fresh on
//! every resolution or export pass from the person set, and the synthesis is
//! deterministic so successive exports of the same graph are stable. See
//! [`crate::export::families`] for the synthesis passes.

use serde::{Deserialize, Serialize};

use crate::id::CrId;

/// Per-child, per-parent-side relationship qualifier.
///
/// A child can be the birth child of one parent in a family and the step or
/// adopted child of the other — the qualifier is tracked for each side
/// independently (Gramps `frel`/`mrel`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pedigree {
    #[default]
    Birth,
    Stepchild,
    Adopted,
}

impl Pedigree {
    /// The Gramps `mrel`/`frel` attribute value.
    pub fn as_gramps(self) -> &'static str {
        match self {
            Pedigree::Birth => "Birth",
            Pedigree::Stepchild => "Stepchild",
            Pedigree::Adopted => "Adopted",
        }
    }

    /// Parse a Gramps `mrel`/`frel` attribute value, case-insensitively.
    ///
    /// Returns `None` for qualifiers this engine does not model (Foster,
    /// Sponsored, ...) — the caller downgrades those to `Birth` with a warning.
    pub fn from_gramps(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "birth" => Some(Pedigree::Birth),
            "stepchild" => Some(Pedigree::Stepchild),
            "adopted" => Some(Pedigree::Adopted),
            _ => None,
        }
    }
}

/// One child's membership in a family, qualified per parent side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildLink {
    pub child: CrId,
    pub father_rel: Pedigree,
    pub mother_rel: Pedigree,
}

impl ChildLink {
    pub fn birth(child: CrId) -> Self {
        Self {
            child,
            father_rel: Pedigree::Birth,
            mother_rel: Pedigree::Birth,
        }
    }
}

/// Marriage metadata attached to a couple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarriageFact {
    pub date: Option<String>,
    pub place: Option<String>,
}

/// A synthesized family record: a parent pair (either side optional) plus
/// qualified child links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyView {
    pub father: Option<CrId>,
    pub mother: Option<CrId>,
    pub children: Vec<ChildLink>,
    pub marriage: Option<MarriageFact>,
}

impl FamilyView {
    pub fn new(father: Option<CrId>, mother: Option<CrId>) -> Self {
        Self {
            father,
            mother,
            children: Vec::new(),
            marriage: None,
        }
    }

    /// Ordering key used to keep synthesis deterministic.
    pub fn sort_key(&self) -> (String, String) {
        (
            self.father
                .as_ref()
                .map(|h| h.as_str().to_owned())
                .unwrap_or_default(),
            self.mother
                .as_ref()
                .map(|h| h.as_str().to_owned())
                .unwrap_or_default(),
        )
    }
}
