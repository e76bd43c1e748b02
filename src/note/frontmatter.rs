//! YAML frontmatter extraction from markdown notes.
//!
//! The YAML is parsed with `serde_yaml` and converted to `serde_json::Value`
//! for uniform downstream handling; field order is kept stable through a
//! `BTreeMap` so rewrites are deterministic.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::NoteError;

/// Extract the frontmatter block from note text.
///
/// The note must open with a `---` line (an optional BOM is tolerated); the
/// block ends at the next `---` or `...` line. Returns the parsed fields and
/// the 1-based line number of the closing delimiter.
pub fn extract_frontmatter(input: &str) -> Result<(BTreeMap<String, Value>, u32), NoteError> {
    let mut lines = input.lines();

    let first = lines
        .next()
        .map(|l| l.trim_start_matches('\u{feff}').trim_end())
        .ok_or(NoteError::NoFrontmatter)?;
    if first != "---" {
        return Err(NoteError::NoFrontmatter);
    }

    let mut yaml_lines: Vec<&str> = Vec::new();
    let mut end_line: u32 = 1;
    let mut closed = false;
    for line in lines {
        end_line += 1;
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            closed = true;
            break;
        }
        yaml_lines.push(line);
    }
    if !closed || yaml_lines.is_empty() {
        return Err(NoteError::NoFrontmatter);
    }

    let raw = yaml_lines.join("\n");
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&raw).map_err(|e| NoteError::BadYaml {
            message: e.to_string(),
        })?;
    let json = serde_json::to_value(yaml).map_err(|e| NoteError::BadYaml {
        message: e.to_string(),
    })?;

    match json {
        Value::Object(map) => Ok((map.into_iter().collect(), end_line)),
        _ => Err(NoteError::BadYaml {
            message: "frontmatter is not a mapping".into(),
        }),
    }
}

/// Render a field map back to a frontmatter block (including delimiters).
pub fn render_frontmatter(fields: &BTreeMap<String, Value>) -> String {
    let yaml = serde_yaml::to_string(fields).unwrap_or_default();
    format!("---\n{yaml}---\n")
}

/// Replace the frontmatter block of a note, leaving the body untouched.
///
/// Notes without a frontmatter block get one prepended.
pub fn replace_frontmatter(input: &str, fields: &BTreeMap<String, Value>) -> String {
    let rendered = render_frontmatter(fields);
    match extract_frontmatter(input) {
        Ok((_, end_line)) => {
            let body: Vec<&str> = input.lines().skip(end_line as usize).collect();
            if body.is_empty() {
                rendered
            } else {
                format!("{rendered}{}\n", body.join("\n"))
            }
        }
        Err(_) => format!("{rendered}{input}"),
    }
}
