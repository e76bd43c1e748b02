//! Wikilink parsing and formatting.
//!
//! Relationship fields carry wikilinks (`[[Jane Doe]]`, `[[Jane Doe|Mom]]`)
//! as the human-navigable half of the dual storage. Target comparison is
//! NFC-normalized and case-insensitive, matching how the host application
//! resolves links.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\[([^\[\]|]+)(?:\|([^\[\]]+))?\]\]$").unwrap());

/// A parsed `[[Target]]` or `[[Target|Alias]]` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink {
    pub target: String,
    pub alias: Option<String>,
}

impl Wikilink {
    /// Parse a wikilink. Surrounding whitespace is tolerated; anything that is
    /// not a single well-formed link returns `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = RE_WIKILINK.captures(raw.trim())?;
        Some(Wikilink {
            target: caps[1].trim().to_owned(),
            alias: caps.get(2).map(|m| m.as_str().trim().to_owned()),
        })
    }

    /// Format a bare link to the given note name.
    pub fn format(target: &str) -> String {
        format!("[[{target}]]")
    }

    /// Whether two note names refer to the same note.
    pub fn same_target(a: &str, b: &str) -> bool {
        let norm = |s: &str| s.nfc().collect::<String>().to_lowercase();
        norm(a) == norm(b)
    }
}

impl std::fmt::Display for Wikilink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "[[{}|{}]]", self.target, alias),
            None => write!(f, "[[{}]]", self.target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_link() {
        let link = Wikilink::parse("[[Jane Doe]]").unwrap();
        assert_eq!(link.target, "Jane Doe");
        assert_eq!(link.alias, None);
    }

    #[test]
    fn parses_aliased_link() {
        let link = Wikilink::parse("  [[Jane Doe|Mom]] ").unwrap();
        assert_eq!(link.target, "Jane Doe");
        assert_eq!(link.alias.as_deref(), Some("Mom"));
    }

    #[test]
    fn rejects_non_links() {
        assert!(Wikilink::parse("Jane Doe").is_none());
        assert!(Wikilink::parse("[[unclosed").is_none());
        assert!(Wikilink::parse("[[a]] and [[b]]").is_none());
    }

    #[test]
    fn target_comparison_is_normalized() {
        assert!(Wikilink::same_target("Ada Lovelace", "ada lovelace"));
        // Composed vs decomposed é.
        assert!(Wikilink::same_target("Ren\u{e9}e", "Rene\u{301}e"));
        assert!(!Wikilink::same_target("Ada", "Ava"));
    }

    #[test]
    fn round_trips_through_display() {
        let link = Wikilink::parse("[[Jane Doe|Mom]]").unwrap();
        assert_eq!(link.to_string(), "[[Jane Doe|Mom]]");
        assert_eq!(Wikilink::format("Jane Doe"), "[[Jane Doe]]");
    }
}
