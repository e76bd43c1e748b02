//! Family graph traversal.
//!
//! Ancestor/descendant walks and shortest-relationship-path lookup, all BFS
//! with visited sets: a malformed import can create a loop through step or
//! adoptive relations, so every traversal terminates instead of recursing
//! unboundedly.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::GraphError;
use crate::id::CrId;

use super::cache::FamilyGraph;
use super::{GraphResult, KinEdge, ParentKind};

/// Direction of one hop in a kin path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Child → parent.
    Up(ParentKind),
    /// Parent → child.
    Down(ParentKind),
    Spouse,
}

/// One hop in a kin path: the person arrived at and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinStep {
    pub to: CrId,
    pub kind: StepKind,
}

impl FamilyGraph {
    /// All ancestors reachable through biological and adoptive parent edges.
    pub fn ancestors(&self, id: &CrId, include_self: bool) -> GraphResult<Vec<CrId>> {
        self.walk_parents(id, include_self, Direction::Incoming, false)
    }

    /// All descendants reachable through biological and adoptive child edges.
    ///
    /// With `include_spouses`, each descendant's spouses are appended to the
    /// result (they are not traversed through).
    pub fn descendants(
        &self,
        id: &CrId,
        include_self: bool,
        include_spouses: bool,
    ) -> GraphResult<Vec<CrId>> {
        self.walk_parents(id, include_self, Direction::Outgoing, include_spouses)
    }

    fn walk_parents(
        &self,
        id: &CrId,
        include_self: bool,
        direction: Direction,
        include_spouses: bool,
    ) -> GraphResult<Vec<CrId>> {
        let cache = self.cache();
        let start = *cache
            .index
            .get(id)
            .ok_or_else(|| GraphError::PersonNotFound {
                cr_id: id.as_str().to_owned(),
            })?
            .value();

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut result: Vec<CrId> = Vec::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let is_start = node == start;
            if !is_start || include_self {
                result.push(cache.graph[node].clone());
            }
            if include_spouses && !is_start {
                for edge in cache.graph.edges_directed(node, Direction::Outgoing) {
                    if matches!(edge.weight(), KinEdge::Spouse) && visited.insert(edge.target()) {
                        result.push(cache.graph[edge.target()].clone());
                    }
                }
            }
            for edge in cache.graph.edges_directed(node, direction) {
                if !matches!(edge.weight(), KinEdge::Parent(_)) {
                    continue;
                }
                // Step edges are not ancestry.
                if matches!(edge.weight(), KinEdge::Parent(ParentKind::Step)) {
                    continue;
                }
                let next = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(result)
    }

    /// Shortest relationship path between two persons, BFS over the
    /// parent/child/spouse edge set (step and adoptive edges included).
    ///
    /// Returns `Ok(None)` when the two persons are not connected.
    pub fn shortest_kin_path(&self, from: &CrId, to: &CrId) -> GraphResult<Option<Vec<KinStep>>> {
        let cache = self.cache();
        let lookup = |id: &CrId| -> GraphResult<NodeIndex> {
            cache
                .index
                .get(id)
                .map(|e| *e.value())
                .ok_or_else(|| GraphError::PersonNotFound {
                    cr_id: id.as_str().to_owned(),
                })
        };
        let start = lookup(from)?;
        let goal = lookup(to)?;
        if start == goal {
            return Ok(Some(Vec::new()));
        }

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut came_from: HashMap<NodeIndex, (NodeIndex, StepKind)> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        'search: while let Some(node) = queue.pop_front() {
            // Up: this node's parents are sources of incoming parent edges.
            for edge in cache.graph.edges_directed(node, Direction::Incoming) {
                if let KinEdge::Parent(kind) = edge.weight() {
                    let next = edge.source();
                    if visited.insert(next) {
                        came_from.insert(next, (node, StepKind::Up(*kind)));
                        if next == goal {
                            break 'search;
                        }
                        queue.push_back(next);
                    }
                }
            }
            for edge in cache.graph.edges_directed(node, Direction::Outgoing) {
                let kind = match edge.weight() {
                    KinEdge::Parent(kind) => StepKind::Down(*kind),
                    KinEdge::Spouse => StepKind::Spouse,
                };
                let next = edge.target();
                if visited.insert(next) {
                    came_from.insert(next, (node, kind));
                    if next == goal {
                        break 'search;
                    }
                    queue.push_back(next);
                }
            }
        }

        if !came_from.contains_key(&goal) {
            return Ok(None);
        }
        let mut path: Vec<KinStep> = Vec::new();
        let mut node = goal;
        while node != start {
            let (prev, kind) = came_from[&node];
            path.push(KinStep {
                to: cache.graph[node].clone(),
                kind,
            });
            node = prev;
        }
        path.reverse();
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;

    fn id(s: &str) -> CrId {
        CrId::new(s).unwrap()
    }

    /// Three generations: gf → f → c, plus f's wife m (c's mother).
    fn three_generations() -> FamilyGraph {
        let mut gf = Person::new(id("gf"), "Grandfather");
        let mut f = Person::new(id("f"), "Father");
        let mut m = Person::new(id("m"), "Mother");
        let mut c = Person::new(id("c"), "Child");
        f.father = Some(id("gf"));
        gf.children = vec![id("f")];
        c.father = Some(id("f"));
        c.mother = Some(id("m"));
        f.children = vec![id("c")];
        m.children = vec![id("c")];
        f.add_spouse(id("m"));
        m.add_spouse(id("f"));
        FamilyGraph::from_persons(vec![gf, f, m, c]).unwrap()
    }

    #[test]
    fn ancestors_walk_up() {
        let graph = three_generations();
        let ancestors = graph.ancestors(&id("c"), false).unwrap();
        assert!(ancestors.contains(&id("f")));
        assert!(ancestors.contains(&id("m")));
        assert!(ancestors.contains(&id("gf")));
        assert_eq!(ancestors.len(), 3);
    }

    #[test]
    fn include_self_flag() {
        let graph = three_generations();
        let with_self = graph.ancestors(&id("c"), true).unwrap();
        assert!(with_self.contains(&id("c")));
        assert_eq!(with_self.len(), 4);
    }

    #[test]
    fn descendants_walk_down() {
        let graph = three_generations();
        let descendants = graph.descendants(&id("gf"), false, false).unwrap();
        assert_eq!(descendants, vec![id("f"), id("c")]);
    }

    #[test]
    fn descendants_with_spouses() {
        let graph = three_generations();
        let descendants = graph.descendants(&id("gf"), false, true).unwrap();
        assert!(descendants.contains(&id("m"))); // f's wife
    }

    #[test]
    fn unknown_seed_errors() {
        let graph = three_generations();
        assert!(graph.ancestors(&id("nope"), false).is_err());
    }

    #[test]
    fn cyclic_data_terminates() {
        // a is b's parent and, through bad data, also b's child.
        let mut a = Person::new(id("a"), "A");
        let mut b = Person::new(id("b"), "B");
        b.father = Some(id("a"));
        a.children = vec![id("b")];
        a.father = Some(id("b"));
        b.children.push(id("a"));
        let graph = FamilyGraph::from_persons(vec![a, b]).unwrap();

        let ancestors = graph.ancestors(&id("a"), false).unwrap();
        assert_eq!(ancestors, vec![id("b")]);
    }

    #[test]
    fn shortest_path_to_grandparent() {
        let graph = three_generations();
        let path = graph.shortest_kin_path(&id("c"), &id("gf")).unwrap().unwrap();
        assert_eq!(path.len(), 2);
        assert!(matches!(path[0].kind, StepKind::Up(ParentKind::Biological)));
        assert_eq!(path[1].to, id("gf"));
    }

    #[test]
    fn shortest_path_to_spouse() {
        let graph = three_generations();
        let path = graph.shortest_kin_path(&id("f"), &id("m")).unwrap().unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].kind, StepKind::Spouse);
    }

    #[test]
    fn disconnected_persons_have_no_path() {
        let mut graph_persons = vec![Person::new(id("a"), "A"), Person::new(id("b"), "B")];
        graph_persons[0].occupation = Some("hermit".into());
        let graph = FamilyGraph::from_persons(graph_persons).unwrap();
        assert_eq!(graph.shortest_kin_path(&id("a"), &id("b")).unwrap(), None);
    }

    #[test]
    fn path_to_self_is_empty() {
        let graph = three_generations();
        assert_eq!(
            graph.shortest_kin_path(&id("c"), &id("c")).unwrap(),
            Some(vec![])
        );
    }
}
