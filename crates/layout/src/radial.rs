//! Concentric rings by breadth-first level.

use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, PI};

use crate::graph::{LayoutGraph, Point};

/// Radius of the first ring.
pub(crate) const RING_BASE: f64 = 250.0;
/// Radius added per further ring.
pub(crate) const RING_INCREMENT: f64 = 200.0;
/// Minimum clearance between neighbours on one ring.
const RING_GAP: f64 = 40.0;

pub(crate) fn layout(graph: &LayoutGraph<'_>) -> Vec<Point> {
    let rings = levels(graph);

    let mut points = vec![(0.0, 0.0); graph.len()];
    let mut previous: Option<(f64, f64)> = None;

    for (level, ring) in rings.iter().enumerate() {
        let widest = ring.iter().map(|&i| graph.diagonal(i)).fold(0.0, f64::max);
        let radius = ring_radius(level, ring.len(), widest, previous);
        previous = Some((radius, widest));

        let step = 2.0 * PI / ring.len() as f64;
        for (k, &i) in ring.iter().enumerate() {
            let angle = -FRAC_PI_2 + step * k as f64;
            let center = (radius * angle.cos(), radius * angle.sin());
            points[i] = graph.top_left(i, center);
        }
    }
    points
}

/// Nodes grouped by BFS depth from the roots, in discovery order.
///
/// Roots are nodes without incoming edges; a graph that has none starts
/// from its highest-degree node. Nodes BFS never reaches form one extra
/// ring past the deepest level.
fn levels(graph: &LayoutGraph<'_>) -> Vec<Vec<usize>> {
    let n = graph.len();
    let mut roots: Vec<usize> = (0..n).filter(|&i| graph.predecessors[i].is_empty()).collect();
    if roots.is_empty() {
        roots.extend(graph.highest_degree(0..n));
    }

    let mut level: Vec<Option<usize>> = vec![None; n];
    let mut rings: Vec<Vec<usize>> = Vec::new();
    let mut queue = VecDeque::new();
    for &root in &roots {
        level[root] = Some(0);
        queue.push_back(root);
    }

    while let Some(u) = queue.pop_front() {
        let Some(depth) = level[u] else { continue };
        if rings.len() <= depth {
            rings.resize_with(depth + 1, Vec::new);
        }
        rings[depth].push(u);
        for &v in &graph.successors[u] {
            if level[v].is_none() {
                level[v] = Some(depth + 1);
                queue.push_back(v);
            }
        }
    }

    let unreached: Vec<usize> = (0..n).filter(|&i| level[i].is_none()).collect();
    if !unreached.is_empty() {
        rings.push(unreached);
    }
    rings
}

/// Radius of ring `level`.
///
/// The configured radius (`RING_BASE + (level - 1) * RING_INCREMENT`) is
/// a minimum. A crowded ring grows until `count` discs of diameter
/// `widest` fit side by side, and every ring clears the previous one.
fn ring_radius(level: usize, count: usize, widest: f64, previous: Option<(f64, f64)>) -> f64 {
    let configured = if level == 0 {
        0.0
    } else {
        RING_BASE + (level - 1) as f64 * RING_INCREMENT
    };
    let fit = if count > 1 {
        (widest + RING_GAP) / (2.0 * (PI / count as f64).sin())
    } else {
        0.0
    };
    let clear = previous.map_or(0.0, |(radius, prev_widest)| {
        radius + (prev_widest + widest) / 2.0
    });
    configured.max(fit).max(clear)
}
