//! The canonical family graph.
//!
//! [`FamilyGraph`] owns the single in-memory cache of resolved person records.
//! Calculators, report generators, and exporters all go through its accessors —
//! none of them re-derive relationships independently — so one invalidation is
//! visible everywhere on next access.

pub mod cache;
pub mod consistency;
pub mod kinship;
pub mod traverse;

use serde::{Deserialize, Serialize};

pub use cache::FamilyGraph;
pub use consistency::MirrorViolation;
pub use traverse::{KinStep, StepKind};

use crate::error::GraphError;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// How a parent relates to a child on a kin edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentKind {
    Biological,
    Step,
    Adoptive,
}

/// Edge data in the family graph.
///
/// Parent edges are directed parent→child; spouse edges are inserted in both
/// directions once symmetry is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KinEdge {
    Parent(ParentKind),
    Spouse,
}
