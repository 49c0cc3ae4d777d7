//! Asset/variant lineage graph: entity types and the mutable mirror.

pub mod entities;
pub mod graph;

pub use entities::{Asset, AssetType, LineageEdge, RelationType, Variant, VariantStatus};
pub use graph::{GraphModel, VariantLineage};
