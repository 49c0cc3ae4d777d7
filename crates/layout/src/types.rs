//! Input and output types of the layout engine.

use std::fmt;
use std::str::FromStr;

use lineage_core::model::RelationType;
use lineage_core::types::{AssetId, JobId, VariantId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Selectable layout algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    /// Layered drawing, edges pointing parent -> child.
    #[default]
    Hierarchical,
    /// Physics simulation; initial positions are randomized.
    Force,
    /// Rows ordered by edge degree.
    Grid,
    /// Concentric rings by breadth-first level.
    Radial,
    /// Single ring ordered to keep neighbours adjacent.
    Circular,
}

impl LayoutAlgorithm {
    pub const ALL: [LayoutAlgorithm; 5] = [
        Self::Hierarchical,
        Self::Force,
        Self::Grid,
        Self::Radial,
        Self::Circular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hierarchical => "hierarchical",
            Self::Force => "force",
            Self::Grid => "grid",
            Self::Radial => "radial",
            Self::Circular => "circular",
        }
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutAlgorithm {
    type Err = ParseLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == needle)
            .ok_or_else(|| ParseLayoutError::Algorithm(s.to_string()))
    }
}

/// Flow direction of the hierarchical layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Top to bottom.
    #[default]
    TB,
    /// Left to right.
    LR,
    /// Bottom to top.
    BT,
    /// Right to left.
    RL,
}

impl Direction {
    /// Ranks advance along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LR | Self::RL)
    }

    /// Ranks advance towards negative coordinates.
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::BT | Self::RL)
    }
}

impl FromStr for Direction {
    type Err = ParseLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TB" => Ok(Self::TB),
            "LR" => Ok(Self::LR),
            "BT" => Ok(Self::BT),
            "RL" => Ok(Self::RL),
            _ => Err(ParseLayoutError::Direction(s.to_string())),
        }
    }
}

/// Errors from parsing layout option strings.
#[derive(Debug, thiserror::Error)]
pub enum ParseLayoutError {
    #[error("Unknown layout algorithm '{0}'. Must be one of: hierarchical, force, grid, radial, circular")]
    Algorithm(String),

    #[error("Unknown layout direction '{0}'. Must be one of: TB, LR, BT, RL")]
    Direction(String),
}

/// Per-call layout configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutOptions {
    pub algorithm: LayoutAlgorithm,
    pub direction: Direction,
    /// Seed for the force layout's initial positions. `None` draws one
    /// from the thread RNG.
    pub seed: Option<u64>,
}

impl LayoutOptions {
    pub fn new(algorithm: LayoutAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

// ---------------------------------------------------------------------------
// Graph input
// ---------------------------------------------------------------------------

/// What a layout node stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A variant of the asset being viewed.
    Variant,
    /// A variant of another asset, reached through a lineage edge.
    Ghost,
    /// A generation job that has not produced its variant yet.
    Placeholder { job_id: JobId },
    /// An asset in the project tree.
    Asset,
}

/// A node to be positioned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    /// Name of the underlying asset; orphan packing sorts on it.
    pub label: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub asset_id: Option<AssetId>,
    pub variant_id: Option<VariantId>,
    /// Drives the "generating" animation.
    pub generating: bool,
}

impl GraphNode {
    /// Ghost nodes belong to an asset other than the one viewed.
    pub fn is_external(&self) -> bool {
        self.kind == NodeKind::Ghost
    }
}

/// What an edge stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "relation", rename_all = "snake_case")]
pub enum EdgeKind {
    /// Variant provenance.
    Lineage(RelationType),
    /// Asset tree parent -> child.
    Parent,
    /// Source variant -> in-flight generation placeholder.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
}

/// A directed edge between two layout nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub style: EdgeStyle,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Overlap with positive area; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// A node with its computed top-left position and size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub node: GraphNode,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PositionedNode {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One rendering pass worth of positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<GraphEdge>,
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.node.id == id)
    }

    /// Bounding box of all nodes, `None` when empty.
    pub fn bounds(&self) -> Option<Rect> {
        bounds_of(self.nodes.iter().map(PositionedNode::rect))
    }
}

pub(crate) fn bounds_of(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(&r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn algorithm_parses_case_insensitively() {
        assert_eq!("Radial".parse::<LayoutAlgorithm>().unwrap(), LayoutAlgorithm::Radial);
        assert_eq!(" grid ".parse::<LayoutAlgorithm>().unwrap(), LayoutAlgorithm::Grid);
        assert_matches!(
            "spiral".parse::<LayoutAlgorithm>(),
            Err(ParseLayoutError::Algorithm(_))
        );
    }

    #[test]
    fn direction_parses() {
        assert_eq!("lr".parse::<Direction>().unwrap(), Direction::LR);
        assert!("up".parse::<Direction>().is_err());
        assert!(Direction::RL.is_horizontal());
        assert!(Direction::RL.is_reversed());
        assert!(!Direction::TB.is_reversed());
    }

    #[test]
    fn rect_intersection_excludes_touching() {
        let a = Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = Rect { x: 10.0, y: 0.0, width: 10.0, height: 10.0 };
        let c = Rect { x: 5.0, y: 5.0, width: 10.0, height: 10.0 };
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert_eq!(a.union(&b).width, 20.0);
    }

    #[test]
    fn edge_kind_serializes_with_relation() {
        let json = serde_json::to_value(EdgeKind::Lineage(RelationType::Composed)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "lineage", "relation": "composed"}));
    }
}
