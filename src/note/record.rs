//! Schema-validated person-note records.
//!
//! Note frontmatter is loosely typed: fields may be missing, scalars may stand
//! where lists are expected, and third-party tools add their own keys. Parsing
//! goes through a fixed schema of known fields; everything unknown lands in an
//! `extra` bucket that is preserved verbatim on write-back, never silently
//! dropped. Fields prefixed `_` are privacy-scoped and kept out of every
//! export path unless privacy export is explicitly confirmed.
//!
//! Every relationship field is stored twice — a wikilink (`father`) and a
//! stable id (`father_id`). The read-resolution policy over the pair lives in
//! [`crate::sync`].

use std::collections::BTreeMap;

use serde_json::Value;

use crate::id::CrId;
use crate::model::{ResearchLevel, Sex};
use crate::report::ParseReport;

/// Frontmatter field names.
pub mod fields {
    pub const CR_ID: &str = "cr_id";
    pub const NAME: &str = "name";
    pub const SEX: &str = "sex";
    pub const GENDER_IDENTITY: &str = "gender_identity";
    pub const PRONOUNS: &str = "pronouns";
    pub const BIRTH_DATE: &str = "birth_date";
    pub const DEATH_DATE: &str = "death_date";
    pub const BIRTH_PLACE: &str = "birth_place";
    pub const DEATH_PLACE: &str = "death_place";
    pub const BURIAL_PLACE: &str = "burial_place";
    pub const OCCUPATION: &str = "occupation";
    pub const RESEARCH_LEVEL: &str = "research_level";

    pub const FATHER: &str = "father";
    pub const FATHER_ID: &str = "father_id";
    pub const MOTHER: &str = "mother";
    pub const MOTHER_ID: &str = "mother_id";
    pub const STEPFATHERS: &str = "stepfathers";
    pub const STEPFATHER_IDS: &str = "stepfather_ids";
    pub const STEPMOTHERS: &str = "stepmothers";
    pub const STEPMOTHER_IDS: &str = "stepmother_ids";
    pub const ADOPTIVE_FATHER: &str = "adoptive_father";
    pub const ADOPTIVE_FATHER_ID: &str = "adoptive_father_id";
    pub const ADOPTIVE_MOTHER: &str = "adoptive_mother";
    pub const ADOPTIVE_MOTHER_ID: &str = "adoptive_mother_id";
    pub const SPOUSES: &str = "spouse";
    pub const SPOUSE_IDS: &str = "spouse_id";
    pub const CHILDREN: &str = "children";
    pub const CHILDREN_IDS: &str = "children_id";
}

/// A dual-stored single reference: wikilink text plus stable id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefField {
    pub link: Option<String>,
    pub id: Option<CrId>,
}

impl RefField {
    pub fn is_empty(&self) -> bool {
        self.link.is_none() && self.id.is_none()
    }
}

/// A dual-stored reference list: wikilink texts plus stable ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefListField {
    pub links: Vec<String>,
    pub ids: Vec<CrId>,
}

impl RefListField {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.ids.is_empty()
    }
}

/// A person note's frontmatter, parsed against the known schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonRecord {
    pub cr_id: Option<CrId>,
    pub name: Option<String>,
    pub sex: Option<Sex>,
    pub gender_identity: Option<String>,
    pub pronouns: Option<String>,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_place: Option<String>,
    pub burial_place: Option<String>,
    pub occupation: Option<String>,
    pub research_level: Option<ResearchLevel>,

    pub father: RefField,
    pub mother: RefField,
    pub adoptive_father: RefField,
    pub adoptive_mother: RefField,
    pub stepfathers: RefListField,
    pub stepmothers: RefListField,
    pub spouses: RefListField,
    pub children: RefListField,

    /// `_`-prefixed fields, never surfaced to exports without explicit opt-in.
    pub privacy: BTreeMap<String, Value>,
    /// Unknown fields, preserved verbatim on write-back.
    pub extra: BTreeMap<String, Value>,
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accept both a scalar and a list where a list is expected.
fn as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_string).collect(),
        other => as_string(other).into_iter().collect(),
    }
}

fn as_id(value: &Value) -> Option<CrId> {
    as_string(value).and_then(CrId::new)
}

fn as_id_list(value: &Value) -> Vec<CrId> {
    as_string_list(value)
        .into_iter()
        .filter_map(CrId::new)
        .collect()
}

impl PersonRecord {
    /// Parse a frontmatter field map against the schema.
    pub fn from_fields(map: &BTreeMap<String, Value>) -> Self {
        use fields::*;

        let mut record = PersonRecord::default();
        for (key, value) in map {
            match key.as_str() {
                CR_ID => record.cr_id = as_id(value),
                NAME => record.name = as_string(value),
                SEX => record.sex = as_string(value).map(|s| Sex::from_letter(&s)),
                GENDER_IDENTITY => record.gender_identity = as_string(value),
                PRONOUNS => record.pronouns = as_string(value),
                BIRTH_DATE => record.birth_date = as_string(value),
                DEATH_DATE => record.death_date = as_string(value),
                BIRTH_PLACE => record.birth_place = as_string(value),
                DEATH_PLACE => record.death_place = as_string(value),
                BURIAL_PLACE => record.burial_place = as_string(value),
                OCCUPATION => record.occupation = as_string(value),
                RESEARCH_LEVEL => {
                    record.research_level = value
                        .as_u64()
                        .or_else(|| as_string(value).and_then(|s| s.parse().ok()))
                        .map(|n| ResearchLevel::new(n.min(u8::MAX as u64) as u8));
                }
                FATHER => record.father.link = as_string(value),
                FATHER_ID => record.father.id = as_id(value),
                MOTHER => record.mother.link = as_string(value),
                MOTHER_ID => record.mother.id = as_id(value),
                ADOPTIVE_FATHER => record.adoptive_father.link = as_string(value),
                ADOPTIVE_FATHER_ID => record.adoptive_father.id = as_id(value),
                ADOPTIVE_MOTHER => record.adoptive_mother.link = as_string(value),
                ADOPTIVE_MOTHER_ID => record.adoptive_mother.id = as_id(value),
                STEPFATHERS => record.stepfathers.links = as_string_list(value),
                STEPFATHER_IDS => record.stepfathers.ids = as_id_list(value),
                STEPMOTHERS => record.stepmothers.links = as_string_list(value),
                STEPMOTHER_IDS => record.stepmothers.ids = as_id_list(value),
                SPOUSES => record.spouses.links = as_string_list(value),
                SPOUSE_IDS => record.spouses.ids = as_id_list(value),
                CHILDREN => record.children.links = as_string_list(value),
                CHILDREN_IDS => record.children.ids = as_id_list(value),
                _ if key.starts_with('_') => {
                    record.privacy.insert(key.clone(), value.clone());
                }
                _ => {
                    record.extra.insert(key.clone(), value.clone());
                }
            }
        }
        record
    }

    /// Validate required/expected fields, accumulating diagnostics.
    pub fn validate(&self, path: &str, report: &mut ParseReport) {
        if self.cr_id.is_none() {
            report.error(path, "record has no cr_id");
        }
        if self.name.is_none() {
            report.warning(path, "record has no name");
        }
        if self.sex.is_none() {
            report.warning(path, "record has no sex");
        }
    }

    /// Render back to a frontmatter field map.
    ///
    /// Known fields are written from the typed values; privacy and extra
    /// fields pass through verbatim.
    pub fn to_fields(&self) -> BTreeMap<String, Value> {
        use fields::*;

        let mut map: BTreeMap<String, Value> = BTreeMap::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                map.insert(key.to_owned(), v);
            }
        };
        let s = |v: &Option<String>| v.clone().map(Value::String);
        let id = |v: &Option<CrId>| v.as_ref().map(|i| Value::String(i.as_str().to_owned()));
        let list = |v: &[String]| {
            if v.is_empty() {
                None
            } else {
                Some(Value::Array(
                    v.iter().cloned().map(Value::String).collect(),
                ))
            }
        };
        let id_list = |v: &[CrId]| {
            if v.is_empty() {
                None
            } else {
                Some(Value::Array(
                    v.iter()
                        .map(|i| Value::String(i.as_str().to_owned()))
                        .collect(),
                ))
            }
        };

        put(CR_ID, id(&self.cr_id));
        put(NAME, s(&self.name));
        put(
            SEX,
            self.sex.map(|sex| Value::String(sex.as_letter().to_owned())),
        );
        put(GENDER_IDENTITY, s(&self.gender_identity));
        put(PRONOUNS, s(&self.pronouns));
        put(BIRTH_DATE, s(&self.birth_date));
        put(DEATH_DATE, s(&self.death_date));
        put(BIRTH_PLACE, s(&self.birth_place));
        put(DEATH_PLACE, s(&self.death_place));
        put(BURIAL_PLACE, s(&self.burial_place));
        put(OCCUPATION, s(&self.occupation));
        put(
            RESEARCH_LEVEL,
            self.research_level.map(|r| Value::from(r.get())),
        );

        put(FATHER, s(&self.father.link));
        put(FATHER_ID, id(&self.father.id));
        put(MOTHER, s(&self.mother.link));
        put(MOTHER_ID, id(&self.mother.id));
        put(ADOPTIVE_FATHER, s(&self.adoptive_father.link));
        put(ADOPTIVE_FATHER_ID, id(&self.adoptive_father.id));
        put(ADOPTIVE_MOTHER, s(&self.adoptive_mother.link));
        put(ADOPTIVE_MOTHER_ID, id(&self.adoptive_mother.id));
        put(STEPFATHERS, list(&self.stepfathers.links));
        put(STEPFATHER_IDS, id_list(&self.stepfathers.ids));
        put(STEPMOTHERS, list(&self.stepmothers.links));
        put(STEPMOTHER_IDS, id_list(&self.stepmothers.ids));
        put(SPOUSES, list(&self.spouses.links));
        put(SPOUSE_IDS, id_list(&self.spouses.ids));
        put(CHILDREN, list(&self.children.links));
        put(CHILDREN_IDS, id_list(&self.children.ids));

        for (key, value) in &self.privacy {
            map.insert(key.clone(), value.clone());
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}
