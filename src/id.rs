//! Stable person/entity identifiers.
//!
//! Every canonical entity is addressed by a [`CrId`]: an opaque string that is
//! immutable once assigned and unique across the graph. Freshly created
//! entities get a generated id; imported entities keep whatever native
//! identifier their source format carried (a Gramps handle, a GEDCOM xref),
//! so re-imports remain stable.

use serde::{Deserialize, Serialize};

/// Opaque stable identifier for a canonical entity.
///
/// The only structural requirement is non-emptiness; beyond that the engine
/// never inspects the contents, so any source format's native id survives
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrId(String);

impl CrId {
    /// Wrap a raw identifier string.
    ///
    /// Returns `None` if the string is empty or all whitespace.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(CrId(raw))
        }
    }

    /// Generate a fresh random identifier (UUID v4, simple form).
    pub fn generate() -> Self {
        CrId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CrId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(CrId::new("").is_none());
        assert!(CrId::new("   ").is_none());
    }

    #[test]
    fn preserves_native_ids() {
        let id = CrId::new("_f00d_gramps_handle").unwrap();
        assert_eq!(id.as_str(), "_f00d_gramps_handle");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = CrId::generate();
        let b = CrId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }
}
