//! Layout entry point: partitions the input, dispatches to the selected
//! algorithm and packs orphans next to the result.

use std::collections::{HashMap, HashSet};

use lineage_core::dimensions::DimensionMap;

use crate::graph::{LayoutGraph, Point};
use crate::types::{
    bounds_of, GraphEdge, GraphNode, LayoutAlgorithm, LayoutOptions, LayoutResult,
    PositionedNode, Rect,
};
use crate::{circular, force, grid, hierarchical, orphans, radial};

/// Position `nodes` with the algorithm selected in `options`.
///
/// Edges whose endpoints are not in `nodes` are dropped; all other edges
/// are returned unchanged, parallel edges included. Nodes missing from
/// `dims` get the default size. Output nodes keep input order and the
/// connected part of the layout starts at the origin.
///
/// Every algorithm except [`LayoutAlgorithm::Force`] is deterministic. The
/// force layout is deterministic only when `options.seed` is set.
pub fn compute_layout(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    dims: &DimensionMap,
    options: &LayoutOptions,
) -> LayoutResult {
    if nodes.is_empty() {
        return LayoutResult::default();
    }

    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges: Vec<&GraphEdge> = edges
        .iter()
        .filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
        .collect();

    let endpoints: HashSet<&str> = edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();
    let (connected, isolated): (Vec<&GraphNode>, Vec<&GraphNode>) = nodes
        .iter()
        .partition(|n| endpoints.contains(n.id.as_str()));

    let mut positions: HashMap<&str, Point> = HashMap::with_capacity(nodes.len());
    let mut connected_bounds: Option<Rect> = None;

    if !connected.is_empty() {
        let graph = LayoutGraph::build(&connected, &edges, dims);
        let placed = match options.algorithm {
            LayoutAlgorithm::Hierarchical => hierarchical::layout(&graph, options.direction),
            LayoutAlgorithm::Force => force::layout(&graph, options.seed),
            LayoutAlgorithm::Grid => grid::layout(&graph),
            LayoutAlgorithm::Radial => radial::layout(&graph),
            LayoutAlgorithm::Circular => circular::layout(&graph),
        };
        let placed = normalize(placed);

        connected_bounds = bounds_of(placed.iter().enumerate().map(|(i, &(x, y))| Rect {
            x,
            y,
            width: graph.sizes[i].width,
            height: graph.sizes[i].height,
        }));
        for (&node, point) in graph.nodes.iter().zip(placed) {
            positions.insert(node.id.as_str(), point);
        }
    }

    let origin = orphans::anchor(connected_bounds, options.algorithm, options.direction);
    for (node, point) in orphans::pack(&isolated, dims, origin) {
        positions.insert(node.id.as_str(), point);
    }

    tracing::debug!(
        algorithm = %options.algorithm,
        connected = connected.len(),
        orphans = isolated.len(),
        edges = edges.len(),
        "Computed layout"
    );

    LayoutResult {
        nodes: nodes
            .iter()
            .map(|node| {
                let (x, y) = positions.get(node.id.as_str()).copied().unwrap_or_default();
                let size = dims.get(&node.id).copied().unwrap_or_default();
                PositionedNode {
                    node: node.clone(),
                    x,
                    y,
                    width: size.width,
                    height: size.height,
                }
            })
            .collect(),
        edges: edges.into_iter().cloned().collect(),
    }
}

/// Shift positions so the top-left of their bounding box is the origin.
fn normalize(mut placed: Vec<Point>) -> Vec<Point> {
    let min_x = placed.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let min_y = placed.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    if !min_x.is_finite() || !min_y.is_finite() {
        return placed;
    }
    for p in &mut placed {
        p.0 -= min_x;
        p.1 -= min_y;
    }
    placed
}
