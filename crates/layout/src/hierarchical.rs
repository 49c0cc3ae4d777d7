//! Layered (Sugiyama-style) drawing.
//!
//! 1. Break cycles by reversing DFS back edges.
//! 2. Rank nodes by longest path from the sources.
//! 3. Split edges spanning several ranks with dummy vertices.
//! 4. Reduce crossings with alternating barycenter sweeps.
//! 5. Center every layer on the cross axis and stack layers on the main axis.

use std::collections::{BTreeSet, VecDeque};

use crate::graph::{LayoutGraph, Point};
use crate::types::Direction;

/// Gap between neighbours in one layer.
pub(crate) const NODE_SEP: f64 = 60.0;

/// Gap between consecutive layers.
pub(crate) const RANK_SEP: f64 = 120.0;

/// Footprint of the dummy vertices that route long edges.
const DUMMY_SIZE: f64 = 20.0;

const ORDER_SWEEPS: usize = 8;

pub(crate) fn layout(graph: &LayoutGraph<'_>, direction: Direction) -> Vec<Point> {
    let edges = acyclic_edges(graph);
    let ranks = longest_path_ranks(graph.len(), &edges);
    let mut layered = Layered::build(graph, &edges, ranks);
    layered.reduce_crossings();
    layered.coordinates(direction)
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Finished,
}

/// Distinct edges with every DFS back edge reversed.
fn acyclic_edges(graph: &LayoutGraph<'_>) -> Vec<(usize, usize)> {
    let mut mark = vec![Mark::Unvisited; graph.len()];
    let mut edges = BTreeSet::new();

    for start in 0..graph.len() {
        if mark[start] != Mark::Unvisited {
            continue;
        }
        mark[start] = Mark::OnStack;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let Some(&next) = graph.successors[node].get(top.1) else {
                mark[node] = Mark::Finished;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match mark[next] {
                Mark::OnStack => {
                    edges.insert((next, node));
                }
                Mark::Unvisited => {
                    edges.insert((node, next));
                    mark[next] = Mark::OnStack;
                    stack.push((next, 0));
                }
                Mark::Finished => {
                    edges.insert((node, next));
                }
            }
        }
    }
    edges.into_iter().collect()
}

/// Rank of each node: length of the longest path reaching it.
fn longest_path_ranks(n: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; n];
    let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(s, t) in edges {
        indegree[t] += 1;
        out[s].push(t);
    }

    let mut rank = vec![0usize; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    while let Some(u) = queue.pop_front() {
        for &v in &out[u] {
            rank[v] = rank[v].max(rank[u] + 1);
            indegree[v] -= 1;
            if indegree[v] == 0 {
                queue.push_back(v);
            }
        }
    }
    rank
}

// ---------------------------------------------------------------------------
// Layered graph
// ---------------------------------------------------------------------------

/// Real nodes occupy indices `0..real`; dummies follow.
struct Layered {
    real: usize,
    sizes: Vec<(f64, f64)>,
    layers: Vec<Vec<usize>>,
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
}

impl Layered {
    fn build(graph: &LayoutGraph<'_>, edges: &[(usize, usize)], mut ranks: Vec<usize>) -> Self {
        let real = graph.len();
        let mut sizes: Vec<(f64, f64)> = graph.sizes.iter().map(|d| (d.width, d.height)).collect();
        let mut up: Vec<Vec<usize>> = vec![Vec::new(); real];
        let mut down: Vec<Vec<usize>> = vec![Vec::new(); real];

        for &(s, t) in edges {
            let mut prev = s;
            for rank in ranks[s] + 1..ranks[t] {
                let dummy = sizes.len();
                sizes.push((DUMMY_SIZE, DUMMY_SIZE));
                ranks.push(rank);
                up.push(vec![prev]);
                down.push(Vec::new());
                down[prev].push(dummy);
                prev = dummy;
            }
            down[prev].push(t);
            up[t].push(prev);
        }

        let depth = ranks.iter().max().map_or(0, |&r| r + 1);
        let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
        for (vertex, &rank) in ranks.iter().enumerate() {
            layers[rank].push(vertex);
        }

        Self {
            real,
            sizes,
            layers,
            up,
            down,
        }
    }

    fn positions(&self) -> Vec<usize> {
        let mut pos = vec![0usize; self.sizes.len()];
        for layer in &self.layers {
            for (i, &v) in layer.iter().enumerate() {
                pos[v] = i;
            }
        }
        pos
    }

    fn crossings(&self) -> usize {
        let pos = self.positions();
        let mut total = 0;
        for layer in &self.layers {
            let segments: Vec<(usize, usize)> = layer
                .iter()
                .flat_map(|&v| self.down[v].iter().map(move |&w| (v, w)))
                .map(|(v, w)| (pos[v], pos[w]))
                .collect();
            for (i, a) in segments.iter().enumerate() {
                for b in &segments[i + 1..] {
                    if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                        total += 1;
                    }
                }
            }
        }
        total
    }

    /// Reorder one layer by the mean position of its neighbours in the
    /// adjacent fixed layer. Vertices without neighbours keep their slot.
    fn order_by_barycenter(&mut self, layer: usize, downward: bool) {
        let pos = self.positions();
        let neighbours = if downward { &self.up } else { &self.down };
        let mut keyed: Vec<(f64, usize)> = self.layers[layer]
            .iter()
            .enumerate()
            .map(|(slot, &v)| {
                let adjacent = &neighbours[v];
                if adjacent.is_empty() {
                    (slot as f64, v)
                } else {
                    let sum: usize = adjacent.iter().map(|&u| pos[u]).sum();
                    (sum as f64 / adjacent.len() as f64, v)
                }
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.layers[layer] = keyed.into_iter().map(|(_, v)| v).collect();
    }

    fn reduce_crossings(&mut self) {
        let depth = self.layers.len();
        if depth < 2 {
            return;
        }

        let mut best = self.layers.clone();
        let mut best_crossings = self.crossings();

        for sweep in 0..ORDER_SWEEPS {
            if best_crossings == 0 {
                break;
            }
            if sweep % 2 == 0 {
                for layer in 1..depth {
                    self.order_by_barycenter(layer, true);
                }
            } else {
                for layer in (0..depth - 1).rev() {
                    self.order_by_barycenter(layer, false);
                }
            }
            let crossings = self.crossings();
            if crossings < best_crossings {
                best_crossings = crossings;
                best = self.layers.clone();
            }
        }

        tracing::trace!(crossings = best_crossings, "Hierarchical ordering settled");
        self.layers = best;
    }

    /// Top-left corners of the real nodes.
    fn coordinates(&self, direction: Direction) -> Vec<Point> {
        let horizontal = direction.is_horizontal();
        let main_len = |v: usize| if horizontal { self.sizes[v].0 } else { self.sizes[v].1 };
        let cross_len = |v: usize| if horizontal { self.sizes[v].1 } else { self.sizes[v].0 };

        let mut offsets = Vec::with_capacity(self.layers.len());
        let mut cursor = 0.0;
        for layer in &self.layers {
            let extent = layer.iter().map(|&v| main_len(v)).fold(0.0, f64::max);
            offsets.push((cursor, extent));
            cursor += extent + RANK_SEP;
        }
        let total_main = (cursor - RANK_SEP).max(0.0);

        let mut points = vec![(0.0, 0.0); self.real];
        for (layer, &(offset, extent)) in self.layers.iter().zip(&offsets) {
            let span: f64 = layer.iter().map(|&v| cross_len(v)).sum::<f64>()
                + NODE_SEP * layer.len().saturating_sub(1) as f64;
            let mut cross = -span / 2.0;

            for &v in layer {
                let len = main_len(v);
                let mut main = offset + (extent - len) / 2.0;
                if direction.is_reversed() {
                    main = total_main - main - len;
                }
                if v < self.real {
                    points[v] = if horizontal { (main, cross) } else { (cross, main) };
                }
                cross += cross_len(v) + NODE_SEP;
            }
        }
        points
    }
}
