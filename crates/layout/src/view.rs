//! Projection of the graph model into layout input.
//!
//! Three views exist: every variant in the space, the lineage of one
//! asset (with ghost nodes for variants of other assets and placeholder
//! nodes for generations still in flight), and the asset tree.

use std::collections::HashSet;

use lineage_core::dimensions::{DimensionRequest, ThumbnailUrls};
use lineage_core::jobs::JobTracker;
use lineage_core::model::{Asset, GraphModel, LineageEdge, Variant};
use lineage_core::types::AssetId;

use crate::types::{EdgeKind, EdgeStyle, GraphEdge, GraphNode, NodeKind};

/// Which part of the model to lay out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewScope {
    /// Every variant of the space with its active lineage.
    #[default]
    Space,
    /// Variants of one asset plus their cross-asset neighbours.
    Asset(AssetId),
    /// Assets linked by parent relations.
    Tree,
}

impl ViewScope {
    pub fn build(&self, model: &GraphModel, jobs: &JobTracker) -> GraphView {
        match self {
            Self::Space => space_view(model, jobs),
            Self::Asset(asset_id) => asset_lineage_view(model, jobs, asset_id),
            Self::Tree => asset_tree_view(model, jobs),
        }
    }
}

/// Layout input derived from the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphView {
    /// One request per node; nodes without a displayable image get no URL
    /// and therefore the default size.
    pub fn dimension_requests(
        &self,
        model: &GraphModel,
        urls: &dyn ThumbnailUrls,
    ) -> Vec<DimensionRequest> {
        self.nodes
            .iter()
            .map(|node| {
                let variant = match node.kind {
                    NodeKind::Placeholder { .. } => None,
                    NodeKind::Asset => node
                        .asset_id
                        .as_deref()
                        .and_then(|id| model.asset(id))
                        .and_then(|a| a.active_variant_id.as_deref())
                        .and_then(|id| model.variant(id)),
                    NodeKind::Variant | NodeKind::Ghost => {
                        node.variant_id.as_deref().and_then(|id| model.variant(id))
                    }
                };
                DimensionRequest::new(
                    node.id.clone(),
                    variant.and_then(|v| urls.thumbnail_url(v)),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// All variants, grouped by asset, with every active lineage edge.
pub fn space_view(model: &GraphModel, jobs: &JobTracker) -> GraphView {
    let mut assets: Vec<&Asset> = model.assets().collect();
    assets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let nodes = assets
        .iter()
        .flat_map(|asset| {
            model
                .variants_of(&asset.id)
                .into_iter()
                .map(move |v| variant_node(v, asset, NodeKind::Variant, jobs))
        })
        .collect();

    let edges = model
        .active_edges()
        .into_iter()
        .map(|e| lineage_edge(e, EdgeStyle::Solid))
        .collect();

    GraphView { nodes, edges }
}

/// Variants of `asset_id` and their lineage.
///
/// Lineage endpoints owned by another asset become ghost nodes and their
/// edges are dashed. Endpoints that cannot be resolved drop the edge.
/// Active jobs for the asset that have not produced a variant yet become
/// placeholder nodes, linked from their source variant when it is shown.
pub fn asset_lineage_view(model: &GraphModel, jobs: &JobTracker, asset_id: &str) -> GraphView {
    let Some(asset) = model.asset(asset_id) else {
        return GraphView::default();
    };

    let own = model.variants_of(asset_id);
    let own_ids: HashSet<&str> = own.iter().map(|v| v.id.as_str()).collect();

    let mut view = GraphView {
        nodes: own
            .iter()
            .map(|v| variant_node(v, asset, NodeKind::Variant, jobs))
            .collect(),
        edges: Vec::new(),
    };
    let mut ghosts: HashSet<&str> = HashSet::new();
    let mut seen_edges: HashSet<&str> = HashSet::new();

    for variant in &own {
        let lineage = model.lineage_of(&variant.id, false);
        for edge in lineage.parents.into_iter().chain(lineage.children) {
            if !seen_edges.insert(edge.id.as_str()) {
                continue;
            }
            let other = if edge.child_variant_id == variant.id {
                edge.parent_variant_id.as_str()
            } else {
                edge.child_variant_id.as_str()
            };
            if own_ids.contains(other) {
                view.edges.push(lineage_edge(edge, EdgeStyle::Solid));
                continue;
            }
            let Some((ghost, owner)) = model.resolve_ghost(other) else {
                tracing::trace!(edge_id = %edge.id, variant_id = other, "Dropping edge to unknown variant");
                continue;
            };
            if ghosts.insert(ghost.id.as_str()) {
                view.nodes.push(variant_node(ghost, owner, NodeKind::Ghost, jobs));
            }
            view.edges.push(lineage_edge(edge, EdgeStyle::Dashed));
        }
    }

    let shown: HashSet<String> = view.nodes.iter().map(|n| n.id.clone()).collect();
    for job in jobs.active() {
        if job.asset_id.as_deref() != Some(asset_id) {
            continue;
        }
        let node_id = format!("job:{}", job.id);
        view.nodes.push(GraphNode {
            id: node_id.clone(),
            label: asset.name.clone(),
            kind: NodeKind::Placeholder {
                job_id: job.id.clone(),
            },
            asset_id: Some(asset.id.clone()),
            variant_id: None,
            generating: true,
        });
        if let Some(source) = job.variant_id.as_deref().filter(|id| shown.contains(*id)) {
            view.edges.push(GraphEdge {
                id: format!("pending:{}", job.id),
                source: source.to_string(),
                target: node_id,
                kind: EdgeKind::Pending,
                style: EdgeStyle::Dashed,
            });
        }
    }

    view
}

/// Assets with parent -> child edges.
pub fn asset_tree_view(model: &GraphModel, jobs: &JobTracker) -> GraphView {
    let mut assets: Vec<&Asset> = model.assets().collect();
    assets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let nodes = assets
        .iter()
        .map(|asset| GraphNode {
            id: asset.id.clone(),
            label: asset.name.clone(),
            kind: NodeKind::Asset,
            asset_id: Some(asset.id.clone()),
            variant_id: asset.active_variant_id.clone(),
            generating: jobs.is_generating(Some(&asset.id), None)
                || model
                    .variants_of(&asset.id)
                    .iter()
                    .any(|v| v.status.is_in_flight()),
        })
        .collect();

    let edges = assets
        .iter()
        .filter_map(|asset| {
            let parent = asset.parent_asset_id.as_deref()?;
            model.asset(parent)?;
            Some(GraphEdge {
                id: format!("parent:{}", asset.id),
                source: parent.to_string(),
                target: asset.id.clone(),
                kind: EdgeKind::Parent,
                style: EdgeStyle::Solid,
            })
        })
        .collect();

    GraphView { nodes, edges }
}

fn variant_node(variant: &Variant, owner: &Asset, kind: NodeKind, jobs: &JobTracker) -> GraphNode {
    GraphNode {
        id: variant.id.clone(),
        label: owner.name.clone(),
        kind,
        asset_id: Some(owner.id.clone()),
        variant_id: Some(variant.id.clone()),
        generating: variant.status.is_in_flight() || jobs.is_generating(None, Some(&variant.id)),
    }
}

fn lineage_edge(edge: &LineageEdge, style: EdgeStyle) -> GraphEdge {
    GraphEdge {
        id: edge.id.clone(),
        source: edge.parent_variant_id.clone(),
        target: edge.child_variant_id.clone(),
        kind: EdgeKind::Lineage(edge.relation_type),
        style,
    }
}
