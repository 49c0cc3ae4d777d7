//! Degree-ordered grid.

use crate::graph::{LayoutGraph, Point};

pub(crate) const GRID_GAP: f64 = 40.0;

/// Column count for `n` nodes: `ceil(sqrt(1.5 * n))`.
pub(crate) fn columns_for(n: usize) -> usize {
    ((1.5 * n as f64).sqrt().ceil() as usize).max(1)
}

/// Nodes sorted by descending degree, then label, packed row by row.
/// Columns are as wide as their widest node, rows as tall as their
/// tallest.
pub(crate) fn layout(graph: &LayoutGraph<'_>) -> Vec<Point> {
    let n = graph.len();
    let mut order: Vec<usize> = (0..n).collect();
    // Graph order is already label then id; the stable sort keeps it for ties.
    order.sort_by(|&a, &b| graph.degree[b].cmp(&graph.degree[a]));

    let columns = columns_for(n);
    let rows = n.div_ceil(columns);

    let mut column_width = vec![0.0_f64; columns];
    let mut row_height = vec![0.0_f64; rows];
    for (slot, &i) in order.iter().enumerate() {
        let (row, col) = (slot / columns, slot % columns);
        column_width[col] = column_width[col].max(graph.sizes[i].width);
        row_height[row] = row_height[row].max(graph.sizes[i].height);
    }

    let column_x = running_offsets(&column_width);
    let row_y = running_offsets(&row_height);

    let mut points = vec![(0.0, 0.0); n];
    for (slot, &i) in order.iter().enumerate() {
        points[i] = (column_x[slot % columns], row_y[slot / columns]);
    }
    points
}

fn running_offsets(lengths: &[f64]) -> Vec<f64> {
    lengths
        .iter()
        .scan(0.0, |cursor, len| {
            let at = *cursor;
            *cursor += len + GRID_GAP;
            Some(at)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{edge, node};
    use crate::types::{GraphEdge, GraphNode};
    use lineage_core::dimensions::{DimensionMap, NodeDimensions};

    #[test]
    fn column_count_follows_formula() {
        assert_eq!(columns_for(1), 2);
        assert_eq!(columns_for(2), 2);
        assert_eq!(columns_for(6), 3);
        assert_eq!(columns_for(7), 4);
        assert_eq!(columns_for(24), 6);
    }

    #[test]
    fn highest_degree_comes_first() {
        let nodes = [node("a"), node("b"), node("hub")];
        let edges = [edge("hub", "a"), edge("hub", "b")];
        let node_refs: Vec<&GraphNode> = nodes.iter().collect();
        let edge_refs: Vec<&GraphEdge> = edges.iter().collect();
        let mut dims = DimensionMap::new();
        dims.insert("hub".into(), NodeDimensions { width: 200.0, height: 100.0 });
        let graph = LayoutGraph::build(&node_refs, &edge_refs, &dims);

        let points = layout(&graph);
        // Graph order: a, b, hub. Three nodes -> three columns.
        assert_eq!(points[2], (0.0, 0.0));
        assert_eq!(points[0], (240.0, 0.0));
        assert_eq!(points[1], (420.0, 0.0));
    }

    #[test]
    fn rows_use_tallest_node() {
        let nodes: Vec<GraphNode> = (0..4).map(|i| node(&format!("n{i}"))).collect();
        let edges = [edge("n0", "n1"), edge("n2", "n3")];
        let node_refs: Vec<&GraphNode> = nodes.iter().collect();
        let edge_refs: Vec<&GraphEdge> = edges.iter().collect();
        let mut dims = DimensionMap::new();
        dims.insert("n1".into(), NodeDimensions { width: 100.0, height: 260.0 });
        let graph = LayoutGraph::build(&node_refs, &edge_refs, &dims);

        // Four nodes -> three columns; n3 wraps to the second row.
        let points = layout(&graph);
        assert_eq!(points[3].1, 260.0 + GRID_GAP);
        assert_eq!(points[3].0, 0.0);
    }
}
