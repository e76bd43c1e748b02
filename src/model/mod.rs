//! Canonical data model: the format-agnostic hub all conversions pass through.
//!
//! Every interchange format (note frontmatter, Gramps XML, GEDCOM) parses into
//! and exports from these types. Relationship fields hold [`crate::id::CrId`]
//! references, never embedded objects, so the model stays a flat graph that the
//! resolver and synchronizer can repair field-by-field.

pub mod citation;
pub mod event;
pub mod family;
pub mod person;
pub mod place;

pub use citation::{Citation, Confidence};
pub use event::{Event, EventType};
pub use family::{ChildLink, FamilyView, MarriageFact, Pedigree};
pub use person::{Person, ResearchLevel, Sex};
pub use place::{Place, PlaceType};
