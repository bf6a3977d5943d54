//! Wait-for graph and cycle detection.
//!
//! An edge `p → q` means process `p` is waiting on a resource held by `q`.
//! Successors are kept in a `BTreeSet`, so duplicate edges are impossible and
//! traversal visits targets in ascending id order.
//!
//! Cycle detection is an iterative depth-first search with tri-state marking:
//!
//! ```text
//! unvisited ──enter──▶ on-path ──all successors done──▶ finished
//! ```
//!
//! A successor that is still on-path closes a cycle: the suffix of the
//! current path starting at that successor is reported. Finished vertices
//! are never re-entered, so the walk is O(V + E). Cycles are reported once
//! each, up to rotation.

use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Finished,
}

/// Directed wait-for graph over process ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitForGraph {
    edges: BTreeMap<usize, BTreeSet<usize>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `from → to`. Returns false if the edge already existed.
    pub fn insert_edge(&mut self, from: usize, to: usize) -> bool {
        self.edges.entry(from).or_default().insert(to)
    }

    pub fn contains_edge(&self, from: usize, to: usize) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// All edges in ascending `(from, to)` order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges
            .iter()
            .flat_map(|(&from, targets)| targets.iter().map(move |&to| (from, to)))
    }

    fn successors(&self, node: usize) -> btree_set::Iter<'_, usize> {
        static EMPTY: BTreeSet<usize> = BTreeSet::new();
        self.edges.get(&node).unwrap_or(&EMPTY).iter()
    }

    /// Every distinct cycle reachable by the DFS, each in traversal order.
    ///
    /// Non-empty iff the graph has at least one directed cycle. A self-loop
    /// `p → p` is reported as the one-vertex cycle `[p]`.
    pub fn detect_cycles(&self) -> Vec<Vec<usize>> {
        let mut marks: HashMap<usize, Mark> = HashMap::new();
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut cycles = Vec::new();
        let mut path: Vec<usize> = Vec::new();

        for &root in self.edges.keys() {
            if marks.contains_key(&root) {
                continue;
            }

            marks.insert(root, Mark::OnPath);
            path.push(root);
            let mut stack = vec![(root, self.successors(root))];

            while let Some((_, successors)) = stack.last_mut() {
                match successors.next().copied() {
                    Some(next) => match marks.get(&next) {
                        None => {
                            marks.insert(next, Mark::OnPath);
                            path.push(next);
                            stack.push((next, self.successors(next)));
                        }
                        Some(Mark::OnPath) => {
                            if let Some(start) = path.iter().position(|&n| n == next) {
                                let cycle = path[start..].to_vec();
                                if seen.insert(canonical_rotation(&cycle)) {
                                    cycles.push(cycle);
                                }
                            }
                        }
                        Some(Mark::Finished) => {}
                    },
                    None => {
                        if let Some((node, _)) = stack.pop() {
                            marks.insert(node, Mark::Finished);
                            path.pop();
                        }
                    }
                }
            }
        }

        cycles
    }

    pub fn has_cycle(&self) -> bool {
        !self.detect_cycles().is_empty()
    }
}

/// Rotate a cycle so its smallest vertex comes first.
fn canonical_rotation(cycle: &[usize]) -> Vec<usize> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, &v)| v)
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(usize, usize)]) -> WaitForGraph {
        let mut g = WaitForGraph::new();
        for &(from, to) in edges {
            g.insert_edge(from, to);
        }
        g
    }

    fn vertex_set(cycle: &[usize]) -> BTreeSet<usize> {
        cycle.iter().copied().collect()
    }

    #[test]
    fn test_empty_graph_has_no_cycles() {
        assert!(WaitForGraph::new().detect_cycles().is_empty());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut g = WaitForGraph::new();
        assert!(g.insert_edge(0, 1));
        assert!(!g.insert_edge(0, 1));
        assert_eq!(g.edge_count(), 1);
        assert!(g.contains_edge(0, 1));
        assert!(!g.contains_edge(1, 0));
    }

    #[test]
    fn test_three_cycle() {
        let g = graph(&[(0, 1), (1, 2), (2, 0)]);
        let cycles = g.detect_cycles();
        assert_eq!(cycles, vec![vec![0, 1, 2]]);
        for cycle in &cycles {
            assert_eq!(vertex_set(cycle), BTreeSet::from([0, 1, 2]));
        }
    }

    #[test]
    fn test_self_loop_is_cycle_of_length_one() {
        let g = graph(&[(3, 3)]);
        assert_eq!(g.detect_cycles(), vec![vec![3]]);
    }

    #[test]
    fn test_dag_has_no_cycles() {
        // Diamond with a shared sink: 0→1→3, 0→2→3, 3→4
        let g = graph(&[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)]);
        assert!(g.detect_cycles().is_empty());
        assert!(!g.has_cycle());
    }

    #[test]
    fn test_cycle_not_reachable_from_lowest_root() {
        let g = graph(&[(0, 1), (5, 6), (6, 5)]);
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(vertex_set(&cycles[0]), BTreeSet::from([5, 6]));
    }

    #[test]
    fn test_two_cycles_sharing_a_vertex() {
        // 0→1→0 and 1→2→1 share vertex 1
        let g = graph(&[(0, 1), (1, 0), (1, 2), (2, 1)]);
        let cycles = g.detect_cycles();
        let sets: Vec<_> = cycles.iter().map(|c| vertex_set(c)).collect();
        assert!(sets.contains(&BTreeSet::from([0, 1])));
        assert!(sets.contains(&BTreeSet::from([1, 2])));
    }

    #[test]
    fn test_cycle_is_reported_once() {
        // Entering the same 2-cycle from two different roots
        let g = graph(&[(0, 2), (1, 2), (2, 3), (3, 2)]);
        assert_eq!(g.detect_cycles().len(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut g = graph(&[(0, 1), (1, 0)]);
        assert!(g.has_cycle());
        g.clear();
        assert!(g.is_empty());
        assert!(!g.has_cycle());
    }

    #[test]
    fn test_edges_iterate_in_order() {
        let g = graph(&[(2, 0), (0, 3), (0, 1)]);
        let edges: Vec<_> = g.edges().collect();
        assert_eq!(edges, vec![(0, 1), (0, 3), (2, 0)]);
    }

    #[test]
    fn test_canonical_rotation() {
        assert_eq!(canonical_rotation(&[2, 0, 1]), vec![0, 1, 2]);
        assert_eq!(canonical_rotation(&[4]), vec![4]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let edges: Vec<_> = (0..50_000).map(|i| (i, i + 1)).collect();
        let mut g = graph(&edges);
        assert!(!g.has_cycle());
        g.insert_edge(50_000, 0);
        assert!(g.has_cycle());
    }
}
