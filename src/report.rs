//! Accumulated diagnostics and bulk-operation summaries.
//!
//! Parsing and validation never abort on per-record problems: every error and
//! warning is collected with element-path context so review UIs can present
//! the complete list. Bulk operations report counts, never a first-failure.

use serde::{Deserialize, Serialize};

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Blocks committing the parsed data (`valid = false`), but not enumeration.
    Error,
    /// Informational; never blocks.
    Warning,
}

/// A single accumulated parse/validation problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Element-path context, e.g. `people/person[4]` or line number for GEDCOM.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag} at {}: {}", self.path, self.message)
    }
}

/// Full diagnostic list for one parse run.
///
/// `valid()` is false as soon as a single [`Severity::Error`] entry exists;
/// callers must check it before committing any parsed data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(path, message));
    }

    pub fn warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(path, message));
    }

    /// True when no error-severity diagnostics were accumulated.
    pub fn valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn merge(&mut self, other: ParseReport) {
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Summary of a completed import run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub persons: usize,
    pub families: usize,
    pub events: usize,
    pub places: usize,
    pub citations: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl ImportSummary {
    pub fn record_report(&mut self, report: &ParseReport) {
        self.errors += report.errors().count();
        self.warnings += report.warnings().count();
    }
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} persons, {} families, {} events, {} places, {} citations ({} errors, {} warnings)",
            self.persons,
            self.families,
            self.events,
            self.places,
            self.citations,
            self.errors,
            self.warnings
        )
    }
}

/// Summary of a completed export run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSummary {
    pub persons: usize,
    pub families: usize,
    pub events: usize,
    /// Persons excluded by the privacy policy.
    pub excluded: usize,
    /// Lossy-mapping warnings; the export still completed.
    pub warnings: Vec<Diagnostic>,
}

impl std::fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} persons, {} families, {} events ({} excluded, {} warnings)",
            self.persons,
            self.families,
            self.events,
            self.excluded,
            self.warnings.len()
        )
    }
}
