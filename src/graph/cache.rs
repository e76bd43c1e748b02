//! The owned, explicitly-invalidated family graph cache.
//!
//! Uses `petgraph` for the graph structure and `DashMap` for O(1) lookups by
//! cr_id. The cache is rebuilt lazily from the person records whenever it has
//! been invalidated; `invalidate()` is the single entry point, there is no ad
//! hoc clearing anywhere else. Unmirrored edges are dropped at build time (see
//! [`super::consistency`]) so every consumer sees the same repaired view.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::GraphError;
use crate::id::CrId;
use crate::model::Person;

use super::consistency::{self, MirrorViolation};
use super::{GraphResult, KinEdge, ParentKind};

/// Built graph state, shared immutably between consumers until invalidated.
pub(crate) struct GraphCache {
    pub graph: DiGraph<CrId, KinEdge>,
    pub index: DashMap<CrId, NodeIndex>,
    pub violations: Vec<MirrorViolation>,
}

/// The canonical in-memory family graph.
///
/// Owns the person records and the derived petgraph cache. All traversals,
/// calculators, and exporters go through this type's accessors.
pub struct FamilyGraph {
    records: RwLock<BTreeMap<CrId, Person>>,
    cache: RwLock<Option<Arc<GraphCache>>>,
}

impl FamilyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            cache: RwLock::new(None),
        }
    }

    /// Build a graph from resolved person records.
    ///
    /// Fails on duplicate cr_ids — stable ids must be unique across the graph.
    pub fn from_persons(persons: impl IntoIterator<Item = Person>) -> GraphResult<Self> {
        let graph = Self::new();
        {
            let mut records = graph.records.write().expect("graph lock poisoned");
            for person in persons {
                if records.contains_key(&person.cr_id) {
                    return Err(GraphError::DuplicateId {
                        cr_id: person.cr_id.as_str().to_owned(),
                    });
                }
                records.insert(person.cr_id.clone(), person);
            }
        }
        Ok(graph)
    }

    /// Insert or replace a person record, invalidating the cache.
    pub fn insert_person(&self, person: Person) {
        self.records
            .write()
            .expect("graph lock poisoned")
            .insert(person.cr_id.clone(), person);
        self.invalidate();
    }

    /// Remove a person record, invalidating the cache.
    ///
    /// Deletion is always explicit; a person disconnected from everyone else
    /// is never garbage-collected implicitly.
    pub fn remove_person(&self, id: &CrId) -> Option<Person> {
        let removed = self
            .records
            .write()
            .expect("graph lock poisoned")
            .remove(id);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Drop the derived cache. The next accessor call rebuilds it.
    ///
    /// This is the single invalidation entry point; callers that detect an
    /// external change to the underlying records go through here.
    pub fn invalidate(&self) {
        *self.cache.write().expect("graph lock poisoned") = None;
    }

    /// Look up one person by cr_id.
    pub fn person(&self, id: &CrId) -> Option<Person> {
        self.records
            .read()
            .expect("graph lock poisoned")
            .get(id)
            .cloned()
    }

    /// All persons, ordered by cr_id.
    pub fn persons(&self) -> Vec<Person> {
        self.records
            .read()
            .expect("graph lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// A point-in-time copy of the record set, for exporters.
    pub fn snapshot(&self) -> BTreeMap<CrId, Person> {
        self.records.read().expect("graph lock poisoned").clone()
    }

    pub fn contains(&self, id: &CrId) -> bool {
        self.records
            .read()
            .expect("graph lock poisoned")
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("graph lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mirror violations found while building the current cache.
    pub fn violations(&self) -> Vec<MirrorViolation> {
        self.cache().violations.clone()
    }

    /// Get the built cache, rebuilding lazily after invalidation.
    pub(crate) fn cache(&self) -> Arc<GraphCache> {
        if let Some(cache) = self.cache.read().expect("graph lock poisoned").as_ref() {
            return Arc::clone(cache);
        }
        let mut slot = self.cache.write().expect("graph lock poisoned");
        // Double-check after acquiring write lock
        if let Some(cache) = slot.as_ref() {
            return Arc::clone(cache);
        }
        let built = Arc::new(self.build_cache());
        *slot = Some(Arc::clone(&built));
        built
    }

    fn build_cache(&self) -> GraphCache {
        let records = self.records.read().expect("graph lock poisoned");
        let violations = consistency::scan(&records);
        let dropped: HashSet<(&CrId, &CrId)> = violations
            .iter()
            .map(|v| (&v.from, &v.to))
            .collect();

        let mut graph: DiGraph<CrId, KinEdge> = DiGraph::new();
        let index: DashMap<CrId, NodeIndex> = DashMap::new();
        for id in records.keys() {
            let node = graph.add_node(id.clone());
            index.insert(id.clone(), node);
        }
        let node_of = |id: &CrId| index.get(id).map(|e| *e.value());

        for person in records.values() {
            let Some(child_node) = node_of(&person.cr_id) else {
                continue;
            };
            let parent_edges = [
                (person.father.as_ref(), ParentKind::Biological),
                (person.mother.as_ref(), ParentKind::Biological),
                (person.adoptive_father.as_ref(), ParentKind::Adoptive),
                (person.adoptive_mother.as_ref(), ParentKind::Adoptive),
            ];
            for (slot, kind) in parent_edges {
                if let Some(parent) = slot {
                    add_parent_edge(&mut graph, &dropped, &node_of, person, parent, kind, child_node);
                }
            }
            for parent in person.stepfathers.iter().chain(person.stepmothers.iter()) {
                add_parent_edge(
                    &mut graph,
                    &dropped,
                    &node_of,
                    person,
                    parent,
                    ParentKind::Step,
                    child_node,
                );
            }
            for spouse in &person.spouses {
                if dropped.contains(&(&person.cr_id, spouse)) {
                    continue;
                }
                if let Some(spouse_node) = node_of(spouse) {
                    graph.add_edge(child_node, spouse_node, KinEdge::Spouse);
                }
            }
        }

        tracing::debug!(
            persons = records.len(),
            edges = graph.edge_count(),
            dropped = violations.len(),
            "family graph cache rebuilt"
        );

        GraphCache {
            graph,
            index,
            violations,
        }
    }
}

fn add_parent_edge(
    graph: &mut DiGraph<CrId, KinEdge>,
    dropped: &HashSet<(&CrId, &CrId)>,
    node_of: &impl Fn(&CrId) -> Option<NodeIndex>,
    child: &Person,
    parent: &CrId,
    kind: ParentKind,
    child_node: NodeIndex,
) {
    if dropped.contains(&(&child.cr_id, parent)) {
        return;
    }
    if let Some(parent_node) = node_of(parent) {
        graph.add_edge(parent_node, child_node, KinEdge::Parent(kind));
    }
}

impl Default for FamilyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FamilyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilyGraph")
            .field("persons", &self.len())
            .finish()
    }
}
