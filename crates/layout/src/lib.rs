//! Layout engine for the asset/variant lineage graph.
//!
//! [`compute_layout`] is a pure function from a node/edge list, a node
//! dimension map and [`LayoutOptions`] to positioned nodes. Five
//! algorithms share one signature; isolated nodes are always packed into
//! a grid beside the connected layout. The [`view`] module projects a
//! [`GraphModel`](lineage_core::model::GraphModel) into the node/edge
//! lists the engine consumes.

mod circular;
mod engine;
mod force;
mod graph;
mod grid;
mod hierarchical;
mod orphans;
mod radial;
pub mod types;
pub mod view;

pub use engine::compute_layout;
pub use types::{
    Direction, EdgeKind, EdgeStyle, GraphEdge, GraphNode, LayoutAlgorithm, LayoutOptions,
    LayoutResult, NodeKind, ParseLayoutError, PositionedNode, Rect,
};
