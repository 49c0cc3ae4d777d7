//! Index-based adjacency shared by the layout algorithms.

use std::collections::{BTreeSet, HashMap};

use lineage_core::dimensions::{DimensionMap, NodeDimensions};

use crate::types::{GraphEdge, GraphNode};

/// Top-left corner of a positioned node.
pub(crate) type Point = (f64, f64);

/// Connected nodes with their sizes and deduplicated adjacency.
///
/// Nodes are ordered by label then id so every algorithm iterates in the
/// same order regardless of input order.
pub(crate) struct LayoutGraph<'a> {
    pub nodes: Vec<&'a GraphNode>,
    pub sizes: Vec<NodeDimensions>,
    /// Distinct targets per node, ascending index, self-loops removed.
    pub successors: Vec<Vec<usize>>,
    /// Distinct sources per node, ascending index, self-loops removed.
    pub predecessors: Vec<Vec<usize>>,
    /// Incident edge count including parallel edges.
    pub degree: Vec<usize>,
}

impl<'a> LayoutGraph<'a> {
    pub fn build(nodes: &[&'a GraphNode], edges: &[&GraphEdge], dims: &DimensionMap) -> Self {
        let mut ordered: Vec<&'a GraphNode> = nodes.to_vec();
        ordered.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));

        let index: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let n = ordered.len();
        let mut succ: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut pred: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut degree = vec![0usize; n];

        for edge in edges {
            let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                continue;
            };
            degree[s] += 1;
            degree[t] += 1;
            if s != t {
                succ[s].insert(t);
                pred[t].insert(s);
            }
        }

        let sizes = ordered
            .iter()
            .map(|n| dims.get(&n.id).copied().unwrap_or_default())
            .collect();

        Self {
            nodes: ordered,
            sizes,
            successors: succ.into_iter().map(|s| s.into_iter().collect()).collect(),
            predecessors: pred.into_iter().map(|s| s.into_iter().collect()).collect(),
            degree,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Undirected distinct neighbours, ascending index.
    pub fn neighbors(&self, i: usize) -> Vec<usize> {
        let set: BTreeSet<usize> = self.successors[i]
            .iter()
            .chain(self.predecessors[i].iter())
            .copied()
            .collect();
        set.into_iter().collect()
    }

    /// Distinct directed edges, in source then target order.
    pub fn edge_pairs(&self) -> Vec<(usize, usize)> {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(s, targets)| targets.iter().map(move |&t| (s, t)))
            .collect()
    }

    /// Largest side of a node.
    pub fn extent(&self, i: usize) -> f64 {
        self.sizes[i].width.max(self.sizes[i].height)
    }

    /// Diameter of the disc enclosing a node. Ring layouts space discs so
    /// the rectangles inside them cannot overlap at any angle.
    pub fn diagonal(&self, i: usize) -> f64 {
        self.sizes[i].width.hypot(self.sizes[i].height)
    }

    /// Convert a centre point to the node's top-left corner.
    pub fn top_left(&self, i: usize, center: Point) -> Point {
        (
            center.0 - self.sizes[i].width / 2.0,
            center.1 - self.sizes[i].height / 2.0,
        )
    }

    /// Index with the highest degree; ties go to the lowest index.
    pub fn highest_degree(&self, candidates: impl IntoIterator<Item = usize>) -> Option<usize> {
        candidates
            .into_iter()
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if self.degree[b] >= self.degree[i] => Some(b),
                _ => Some(i),
            })
    }
}
