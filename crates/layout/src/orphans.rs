//! Grid packing for nodes without incident edges.

use lineage_core::dimensions::DimensionMap;

use crate::graph::Point;
use crate::types::{Direction, GraphNode, LayoutAlgorithm, Rect};

/// Distance between the connected layout and the first orphan.
pub(crate) const ORPHAN_MARGIN: f64 = 80.0;

/// Gap between packed orphans.
pub(crate) const ORPHAN_GAP: f64 = 40.0;

/// Rows wrap once they would grow past this width.
pub(crate) const ORPHAN_MAX_ROW_WIDTH: f64 = 1200.0;

/// Where the orphan block starts.
///
/// Horizontal hierarchical layouts grow rightwards, so orphans go below
/// them; everything else gets orphans on the right.
pub(crate) fn anchor(connected: Option<Rect>, algorithm: LayoutAlgorithm, direction: Direction) -> Point {
    let Some(bounds) = connected else {
        return (0.0, 0.0);
    };
    if algorithm == LayoutAlgorithm::Hierarchical && direction.is_horizontal() {
        (bounds.x, bounds.bottom() + ORPHAN_MARGIN)
    } else {
        (bounds.right() + ORPHAN_MARGIN, bounds.y)
    }
}

/// Pack orphans into wrapping rows, sorted by label then id.
pub(crate) fn pack<'a>(
    orphans: &[&'a GraphNode],
    dims: &DimensionMap,
    origin: Point,
) -> Vec<(&'a GraphNode, Point)> {
    let mut sorted = orphans.to_vec();
    sorted.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));

    let mut placed = Vec::with_capacity(sorted.len());
    let (mut x, mut y) = origin;
    let mut row_height: f64 = 0.0;

    for node in sorted {
        let size = dims.get(&node.id).copied().unwrap_or_default();
        if x > origin.0 && x + size.width > origin.0 + ORPHAN_MAX_ROW_WIDTH {
            x = origin.0;
            y += row_height + ORPHAN_GAP;
            row_height = 0.0;
        }
        placed.push((node, (x, y)));
        x += size.width + ORPHAN_GAP;
        row_height = row_height.max(size.height);
    }
    placed
}
