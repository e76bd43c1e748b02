//! # rootline
//!
//! A genealogical graph engine: builds an in-memory family graph from
//! loosely-typed person note records, resolves parent/spouse/step/adoptive
//! relationships bidirectionally, and round-trips the graph through the
//! Gramps XML and GEDCOM interchange formats.
//!
//! ## Architecture
//!
//! - **Canonical model** (`model`): persons keyed by stable `cr_id`, with
//!   relationship fields as id references; families are a derived view
//! - **Resolution** (`resolve`): two-pass materialize-then-link over raw
//!   family records, shared by every interchange format
//! - **Family graph** (`graph`): the single owned cache (petgraph + dashmap),
//!   BFS traversals, kinship terms, mirror-invariant enforcement
//! - **Interchange** (`gramps`, `gedcom`): staged parsers with accumulated
//!   diagnostics, exporters that invert the resolver
//! - **Dual storage** (`note`, `sync`): wikilink + stable-id fields kept
//!   consistent through idempotent field-level patches
//!
//! ## Library usage
//!
//! ```no_run
//! use rootline::gramps;
//! use rootline::graph::FamilyGraph;
//!
//! let xml = std::fs::read_to_string("family.gramps").unwrap();
//! let import = gramps::import_document(&xml).unwrap();
//! assert!(import.report.valid());
//! let graph = FamilyGraph::from_persons(import.persons.into_values()).unwrap();
//! let ancestors = graph.ancestors(&rootline::id::CrId::new("_i1").unwrap(), false).unwrap();
//! println!("{} ancestors", ancestors.len());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod gedcom;
pub mod gramps;
pub mod graph;
pub mod id;
pub mod model;
pub mod note;
pub mod report;
pub mod resolve;
pub mod sync;
