//! Single ring with neighbours kept adjacent.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::graph::{LayoutGraph, Point};

pub(crate) const MIN_RADIUS: f64 = 200.0;
const NODE_GAP: f64 = 40.0;
const RING_MARGIN: f64 = 40.0;

pub(crate) fn layout(graph: &LayoutGraph<'_>) -> Vec<Point> {
    let n = graph.len();
    let order = greedy_order(graph);
    let radius = ring_radius(graph);

    let mut points = vec![(0.0, 0.0); n];
    if n == 1 {
        points[0] = graph.top_left(0, (0.0, 0.0));
        return points;
    }

    let step = 2.0 * PI / n as f64;
    for (k, &i) in order.iter().enumerate() {
        let angle = -FRAC_PI_2 + step * k as f64;
        points[i] = graph.top_left(i, (radius * angle.cos(), radius * angle.sin()));
    }
    points
}

/// Walk from the highest-degree node, always stepping to the unplaced
/// neighbour with the highest degree, jumping to the highest-degree
/// unplaced node when the walk is stuck.
fn greedy_order(graph: &LayoutGraph<'_>) -> Vec<usize> {
    let n = graph.len();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut current = graph.highest_degree(0..n);

    while let Some(node) = current {
        placed[node] = true;
        order.push(node);
        current = graph
            .highest_degree(graph.neighbors(node).into_iter().filter(|&v| !placed[v]))
            .or_else(|| graph.highest_degree((0..n).filter(|&v| !placed[v])));
    }
    order
}

/// `max(MIN_RADIUS, total span / 2π + margin)`, raised when needed so that
/// adjacent nodes on the ring cannot overlap.
fn ring_radius(graph: &LayoutGraph<'_>) -> f64 {
    let n = graph.len();
    let span: f64 = (0..n).map(|i| graph.extent(i) + NODE_GAP).sum();
    let from_span = span / (2.0 * PI) + RING_MARGIN;

    let widest = (0..n).map(|i| graph.diagonal(i)).fold(0.0, f64::max);
    let chord = if n > 1 {
        (widest + NODE_GAP) / (2.0 * (PI / n as f64).sin())
    } else {
        0.0
    };
    MIN_RADIUS.max(from_span).max(chord)
}
