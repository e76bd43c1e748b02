//! Rich diagnostic error types for the rootline engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. Per-record problems during
//! parsing are *not* errors — they are accumulated as [`crate::report::Diagnostic`]
//! entries; only wholly malformed input or broken invariants surface here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the rootline engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum RootlineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Note(#[from] NoteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gramps(#[from] GrampsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gedcom(#[from] GedcomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Note record errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NoteError {
    #[error("no frontmatter block found")]
    #[diagnostic(
        code(rootline::note::no_frontmatter),
        help(
            "Person notes must start with a YAML frontmatter block delimited by \
             `---` lines. Add one containing at least `cr_id` and `name`."
        )
    )]
    NoFrontmatter,

    #[error("frontmatter is not valid YAML: {message}")]
    #[diagnostic(
        code(rootline::note::bad_yaml),
        help("Fix the YAML syntax between the `---` delimiters and retry.")
    )]
    BadYaml { message: String },

    #[error("record has no cr_id")]
    #[diagnostic(
        code(rootline::note::missing_id),
        help(
            "Every person record needs a stable `cr_id` field. Run the synchronizer \
             to assign one, or add it manually."
        )
    )]
    MissingId,
}

// ---------------------------------------------------------------------------
// Gramps XML errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GrampsError {
    #[error("malformed document: {message}")]
    #[diagnostic(
        code(rootline::gramps::malformed),
        help(
            "The file is not a well-formed Gramps XML export. It must contain a \
             single <database> root element. Re-export from Gramps and retry."
        )
    )]
    Malformed { message: String },

    #[error("XML error: {message}")]
    #[diagnostic(
        code(rootline::gramps::xml),
        help("The XML could not be read. Check for truncation or invalid characters.")
    )]
    Xml { message: String },
}

impl From<quick_xml::Error> for GrampsError {
    fn from(e: quick_xml::Error) -> Self {
        GrampsError::Xml {
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// GEDCOM errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GedcomError {
    #[error("malformed document: {message}")]
    #[diagnostic(
        code(rootline::gedcom::malformed),
        help(
            "The file does not look like GEDCOM: no level-0 record lines were found. \
             GEDCOM lines have the shape `LEVEL [@XREF@] TAG [value]`."
        )
    )]
    Malformed { message: String },
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("person not found: {cr_id}")]
    #[diagnostic(
        code(rootline::graph::person_not_found),
        help("No person with this cr_id exists in the graph. Check the id, or rebuild the graph.")
    )]
    PersonNotFound { cr_id: String },

    #[error("duplicate cr_id: {cr_id}")]
    #[diagnostic(
        code(rootline::graph::duplicate_id),
        help(
            "Two person records share the same cr_id. Stable ids must be unique \
             across the graph; regenerate the id on one of the records."
        )
    )]
    DuplicateId { cr_id: String },
}

// ---------------------------------------------------------------------------
// Synchronizer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("unresolvable reference in field \"{field}\": {target}")]
    #[diagnostic(
        code(rootline::sync::unresolvable),
        help(
            "Neither the id field nor the wikilink could be resolved to a known \
             person. The linked note may have been deleted or renamed outside \
             the vault's tracking."
        )
    )]
    Unresolvable { field: String, target: String },
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("empty graph: nothing to export")]
    #[diagnostic(
        code(rootline::export::empty),
        help("The family graph contains no persons. Import or create records first.")
    )]
    EmptyGraph,

    #[error("write error: {source}")]
    #[diagnostic(
        code(rootline::export::io),
        help("Writing the export document failed. Check disk space and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {message}")]
    #[diagnostic(
        code(rootline::config::read),
        help("Check that the path exists and is readable.")
    )]
    Read { path: String, message: String },

    #[error("invalid config: {message}")]
    #[diagnostic(
        code(rootline::config::invalid),
        help("Fix the TOML syntax or field values in the config file.")
    )]
    Invalid { message: String },
}

/// Convenience alias for functions returning rootline results.
pub type RootlineResult<T> = std::result::Result<T, RootlineError>;
