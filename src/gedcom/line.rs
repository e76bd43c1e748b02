//! GEDCOM line tokenizer.
//!
//! GEDCOM lines have the shape `LEVEL [@XREF@] TAG [value]`. `CONT`/`CONC`
//! continuation lines are folded into the preceding line's value during
//! tokenization so the record builder never sees them.

use std::sync::LazyLock;

use regex::Regex;

use crate::report::ParseReport;

static RE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(@[^@]+@\s+)?([A-Za-z0-9_]+)(?:\s(.*))?$").unwrap());

/// One tokenized GEDCOM line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GedLine {
    pub level: u8,
    /// Cross-reference id, with the surrounding `@` stripped.
    pub xref: Option<String>,
    pub tag: String,
    pub value: String,
}

/// Tokenize GEDCOM text.
///
/// Blank lines are skipped; lines that do not match the grammar accumulate a
/// warning with their line number and are skipped, never fatal.
pub fn tokenize(text: &str, report: &mut ParseReport) -> Vec<GedLine> {
    let mut lines: Vec<GedLine> = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let raw = raw.trim_start_matches('\u{feff}');
        if raw.trim().is_empty() {
            continue;
        }
        let Some(caps) = RE_LINE.captures(raw) else {
            report.warning(
                format!("line {}", number + 1),
                format!("not a GEDCOM line: {:?}", raw.chars().take(50).collect::<String>()),
            );
            continue;
        };

        let level: u8 = caps[1].parse().unwrap_or(0);
        let tag = caps[3].to_uppercase();
        let value = caps.get(4).map(|m| m.as_str().to_owned()).unwrap_or_default();

        // Continuations extend the previous line's value.
        if tag == "CONT" || tag == "CONC" {
            if let Some(previous) = lines.last_mut() {
                if tag == "CONT" {
                    previous.value.push('\n');
                }
                previous.value.push_str(&value);
            }
            continue;
        }

        lines.push(GedLine {
            level,
            xref: caps
                .get(2)
                .map(|m| m.as_str().trim().trim_matches('@').to_owned()),
            tag,
            value,
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_basic_lines() {
        let mut report = ParseReport::new();
        let lines = tokenize("0 @I1@ INDI\n1 NAME John /Doe/\n1 SEX M\n", &mut report);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].level, 0);
        assert_eq!(lines[0].xref.as_deref(), Some("I1"));
        assert_eq!(lines[0].tag, "INDI");
        assert_eq!(lines[1].value, "John /Doe/");
        assert!(report.valid());
    }

    #[test]
    fn folds_continuations() {
        let mut report = ParseReport::new();
        let lines = tokenize("0 NOTE first\n1 CONT second\n1 CONC -part\n", &mut report);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].value, "first\nsecond-part");
    }

    #[test]
    fn malformed_lines_warn_and_skip() {
        let mut report = ParseReport::new();
        let lines = tokenize("0 HEAD\nnot gedcom at all\n0 TRLR\n", &mut report);
        assert_eq!(lines.len(), 2);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn bom_is_tolerated() {
        let mut report = ParseReport::new();
        let lines = tokenize("\u{feff}0 HEAD\n", &mut report);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].tag, "HEAD");
    }
}
