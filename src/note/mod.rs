//! Person-note records: frontmatter parsing, wikilinks, and patches.
//!
//! The engine never touches note files itself — the host application owns file
//! I/O. This module consumes note text or pre-parsed frontmatter maps and
//! produces [`patch::PatchSet`] instructions scoped to exactly the fields that
//! changed, so unrelated frontmatter and the host's formatting conventions are
//! never perturbed.

pub mod frontmatter;
pub mod patch;
pub mod record;
pub mod wikilink;

pub use frontmatter::extract_frontmatter;
pub use patch::{FieldPatch, PatchOp, PatchSet};
pub use record::{PersonRecord, RefField, RefListField};
pub use wikilink::Wikilink;
