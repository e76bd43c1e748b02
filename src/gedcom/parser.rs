//! GEDCOM record parser.
//!
//! Level-0 lines open records; INDI and FAM records are collected into maps
//! keyed by cross-reference id and feed the same two-pass resolver contract
//! as the Gramps parser. Per-record problems accumulate; only a document with
//! no level-0 record at all is a hard failure.

use std::collections::BTreeMap;

use crate::error::GedcomError;
use crate::report::ParseReport;

use super::line::{tokenize, GedLine};

/// A parsed GEDCOM individual.
#[derive(Debug, Clone, Default)]
pub struct GedcomPerson {
    pub xref: String,
    pub name: String,
    /// Raw `SEX` value (`M`/`F`/`U`), absent when the tag is missing.
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_place: Option<String>,
    pub burial_place: Option<String>,
    pub occupation: Option<String>,
    /// Families this person is a child in, with the optional `PEDI` qualifier.
    pub famc: Vec<(String, Option<String>)>,
    /// Families this person is a spouse in.
    pub fams: Vec<String>,
}

/// A parsed GEDCOM family.
#[derive(Debug, Clone, Default)]
pub struct GedcomFamily {
    pub xref: String,
    pub husband: Option<String>,
    pub wife: Option<String>,
    pub children: Vec<String>,
    pub marriage_date: Option<String>,
    pub marriage_place: Option<String>,
}

/// A parsed GEDCOM document: records keyed by xref.
#[derive(Debug, Clone, Default)]
pub struct GedcomDocument {
    pub persons: BTreeMap<String, GedcomPerson>,
    pub families: BTreeMap<String, GedcomFamily>,
}

/// Parsed document plus the full diagnostic list.
#[derive(Debug)]
pub struct ParsedGedcom {
    pub document: GedcomDocument,
    pub report: ParseReport,
}

fn strip_xref_value(value: &str) -> String {
    value.trim().trim_matches('@').to_owned()
}

/// Strip the `/slashes/` GEDCOM puts around surnames.
fn clean_name(raw: &str) -> String {
    raw.replace('/', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse GEDCOM text.
pub fn parse(text: &str) -> Result<ParsedGedcom, GedcomError> {
    let mut report = ParseReport::new();
    let lines = tokenize(text, &mut report);

    // Split into level-0 records.
    let mut records: Vec<&[GedLine]> = Vec::new();
    let mut start: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        if line.level == 0 {
            if let Some(s) = start {
                records.push(&lines[s..i]);
            }
            start = Some(i);
        }
    }
    if let Some(s) = start {
        records.push(&lines[s..]);
    }
    if records.is_empty() {
        return Err(GedcomError::Malformed {
            message: "no level-0 records found".into(),
        });
    }

    let mut document = GedcomDocument::default();
    for (index, record) in records.iter().enumerate() {
        let head = &record[0];
        match head.tag.as_str() {
            "INDI" => parse_person(record, index, &mut document, &mut report),
            "FAM" => parse_family(record, index, &mut document, &mut report),
            // HEAD, TRLR, SOUR, NOTE, SUBM and anything else are passed over.
            _ => {}
        }
    }

    tracing::info!(
        persons = document.persons.len(),
        families = document.families.len(),
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "gedcom document parsed"
    );
    Ok(ParsedGedcom { document, report })
}

/// Walk a record's sub-lines: yields (line, parent-tag-at-level-1).
fn level1_blocks(record: &[GedLine]) -> Vec<(usize, &GedLine)> {
    record
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, l)| l.level == 1)
        .collect()
}

/// Find a level-2 value under a level-1 block.
fn sub_value<'a>(record: &'a [GedLine], block_start: usize, tag: &str) -> Option<&'a str> {
    for line in &record[block_start + 1..] {
        if line.level <= 1 {
            break;
        }
        if line.level == 2 && line.tag == tag {
            return Some(&line.value);
        }
    }
    None
}

fn parse_person(
    record: &[GedLine],
    index: usize,
    document: &mut GedcomDocument,
    report: &mut ParseReport,
) {
    let path = format!("INDI[{index}]");
    let Some(xref) = record[0].xref.clone().filter(|x| !x.is_empty()) else {
        report.error(path, "INDI record has no xref id");
        return;
    };

    let mut person = GedcomPerson {
        xref: xref.clone(),
        ..Default::default()
    };

    for (i, line) in level1_blocks(record) {
        match line.tag.as_str() {
            "NAME" => {
                if person.name.is_empty() {
                    person.name = clean_name(&line.value);
                }
            }
            "SEX" => person.sex = Some(line.value.trim().to_owned()),
            "BIRT" => {
                person.birth_date = sub_value(record, i, "DATE").map(str::to_owned);
                person.birth_place = sub_value(record, i, "PLAC").map(str::to_owned);
            }
            "DEAT" => {
                person.death_date = sub_value(record, i, "DATE").map(str::to_owned);
                person.death_place = sub_value(record, i, "PLAC").map(str::to_owned);
            }
            "BURI" => {
                person.burial_place = sub_value(record, i, "PLAC").map(str::to_owned);
            }
            "OCCU" => person.occupation = Some(line.value.trim().to_owned()),
            "FAMC" => {
                let pedi = sub_value(record, i, "PEDI").map(|p| p.trim().to_lowercase());
                person.famc.push((strip_xref_value(&line.value), pedi));
            }
            "FAMS" => person.fams.push(strip_xref_value(&line.value)),
            _ => {}
        }
    }

    if person.name.is_empty() {
        report.warning(&path, "individual has no NAME");
        person.name = xref.clone();
    }
    if person.sex.is_none() {
        report.warning(&path, "individual has no SEX");
    }
    document.persons.insert(xref, person);
}

fn parse_family(
    record: &[GedLine],
    index: usize,
    document: &mut GedcomDocument,
    report: &mut ParseReport,
) {
    let path = format!("FAM[{index}]");
    let Some(xref) = record[0].xref.clone().filter(|x| !x.is_empty()) else {
        report.error(path, "FAM record has no xref id");
        return;
    };

    let mut family = GedcomFamily {
        xref: xref.clone(),
        ..Default::default()
    };
    for (i, line) in level1_blocks(record) {
        match line.tag.as_str() {
            "HUSB" => family.husband = Some(strip_xref_value(&line.value)),
            "WIFE" => family.wife = Some(strip_xref_value(&line.value)),
            "CHIL" => family.children.push(strip_xref_value(&line.value)),
            "MARR" => {
                family.marriage_date = sub_value(record, i, "DATE").map(str::to_owned);
                family.marriage_place = sub_value(record, i, "PLAC").map(str::to_owned);
            }
            _ => {}
        }
    }
    document.families.insert(xref, family);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
0 HEAD
1 GEDC
2 VERS 5.5.1
0 @I1@ INDI
1 NAME John /Doe/
1 SEX M
1 BIRT
2 DATE 15 JAN 1900
2 PLAC Springfield, Illinois
1 FAMS @F1@
0 @I2@ INDI
1 NAME Jane /Roe/
1 SEX F
1 FAMS @F1@
0 @I3@ INDI
1 NAME Kid /Doe/
1 FAMC @F1@
2 PEDI adopted
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
1 MARR
2 DATE 1 JUN 1925
2 PLAC Chicago
0 TRLR
";

    #[test]
    fn parses_individuals_and_families() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(parsed.report.valid());
        assert_eq!(parsed.document.persons.len(), 3);
        assert_eq!(parsed.document.families.len(), 1);

        let john = &parsed.document.persons["I1"];
        assert_eq!(john.name, "John Doe");
        assert_eq!(john.birth_date.as_deref(), Some("15 JAN 1900"));
        assert_eq!(john.birth_place.as_deref(), Some("Springfield, Illinois"));

        let family = &parsed.document.families["F1"];
        assert_eq!(family.husband.as_deref(), Some("I1"));
        assert_eq!(family.children, vec!["I3"]);
        assert_eq!(family.marriage_date.as_deref(), Some("1 JUN 1925"));
    }

    #[test]
    fn pedi_qualifier_is_kept() {
        let parsed = parse(SAMPLE).unwrap();
        let kid = &parsed.document.persons["I3"];
        assert_eq!(kid.famc, vec![("F1".to_owned(), Some("adopted".to_owned()))]);
    }

    #[test]
    fn missing_sex_is_a_warning() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(parsed.report.valid());
        assert!(parsed.report.warnings().any(|w| w.message.contains("no SEX")));
    }

    #[test]
    fn indi_without_xref_is_an_error() {
        let text = "0 HEAD\n0 INDI\n1 NAME Ghost\n0 TRLR\n";
        let parsed = parse(text).unwrap();
        assert!(!parsed.report.valid());
        assert!(parsed.document.persons.is_empty());
    }

    #[test]
    fn no_records_is_a_hard_failure() {
        assert!(matches!(
            parse("just some text\n"),
            Err(GedcomError::Malformed { .. })
        ));
    }
}
