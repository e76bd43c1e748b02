//! Export-side building blocks shared by the format exporters.
//!
//! Family synthesis, privacy policy, and date normalization are format-neutral;
//! `gramps::exporter` and `gedcom::exporter` consume these and only own their
//! format's serialization.

pub mod dates;
pub mod families;
pub mod privacy;

pub use families::{synthesize_families, FamilySynthesis};
pub use privacy::{apply_policy, is_living, LivingPolicy, PrivacyOptions};
