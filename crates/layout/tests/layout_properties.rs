//! Structural properties every layout algorithm must hold.
//!
//! Runs each algorithm over views projected from a real graph model so the
//! whole path model -> view -> layout is covered.

use lineage_core::dimensions::{DimensionMap, NodeDimensions};
use lineage_core::jobs::{JobStatus, JobTracker};
use lineage_core::model::{
    Asset, AssetType, GraphModel, LineageEdge, RelationType, Variant, VariantStatus,
};
use lineage_layout::view::{asset_lineage_view, space_view, GraphView};
use lineage_layout::{
    compute_layout, Direction, EdgeStyle, LayoutAlgorithm, LayoutOptions, LayoutResult, Rect,
};

fn asset(id: &str, name: &str) -> Asset {
    Asset {
        id: id.into(),
        name: name.into(),
        asset_type: AssetType::Scene,
        parent_asset_id: None,
        active_variant_id: None,
        created_at: None,
        updated_at: None,
    }
}

fn variant(id: &str, asset_id: &str, status: VariantStatus) -> Variant {
    Variant {
        id: id.into(),
        asset_id: asset_id.into(),
        status,
        image_key: None,
        thumb_key: None,
        starred: false,
        created_at: None,
        recipe: None,
        job_id: None,
        error_message: None,
    }
}

fn derived(id: &str, parent: &str, child: &str) -> LineageEdge {
    LineageEdge {
        id: id.into(),
        parent_variant_id: parent.into(),
        child_variant_id: child.into(),
        relation_type: RelationType::Derived,
        severed: false,
        created_at: None,
    }
}

/// A branching lineage with a long edge, a parallel edge and three
/// isolated variants of mixed sizes.
fn sample_model() -> GraphModel {
    let mut model = GraphModel::new();
    let mut parallel = derived("e5", "v1", "v2");
    parallel.relation_type = RelationType::Composed;
    model.apply_snapshot(
        vec![asset("a1", "Harbor"), asset("a2", "Lighthouse"), asset("a3", "Anchor")],
        vec![
            variant("v1", "a1", VariantStatus::Completed),
            variant("v2", "a1", VariantStatus::Completed),
            variant("v3", "a1", VariantStatus::Completed),
            variant("v4", "a2", VariantStatus::Completed),
            variant("v5", "a2", VariantStatus::Completed),
            variant("o1", "a3", VariantStatus::Completed),
            variant("o2", "a3", VariantStatus::Failed),
            variant("o3", "a2", VariantStatus::Pending),
        ],
        Some(vec![
            derived("e1", "v1", "v2"),
            derived("e2", "v2", "v3"),
            derived("e3", "v1", "v3"),
            derived("e4", "v2", "v4"),
            derived("e6", "v4", "v5"),
            parallel,
        ]),
    );
    model
}

fn sample_dims() -> DimensionMap {
    let mut dims = DimensionMap::new();
    dims.insert("v1".into(), NodeDimensions { width: 280.0, height: 140.0 });
    dims.insert("v4".into(), NodeDimensions { width: 80.0, height: 140.0 });
    dims.insert("o2".into(), NodeDimensions { width: 210.0, height: 140.0 });
    dims
}

fn layout(view: &GraphView, dims: &DimensionMap, options: LayoutOptions) -> LayoutResult {
    compute_layout(&view.nodes, &view.edges, dims, &options)
}

fn all_options() -> Vec<LayoutOptions> {
    let mut options: Vec<LayoutOptions> = LayoutAlgorithm::ALL
        .into_iter()
        .map(|a| LayoutOptions::new(a).with_seed(11))
        .collect();
    for direction in [Direction::LR, Direction::BT, Direction::RL] {
        options.push(LayoutOptions::new(LayoutAlgorithm::Hierarchical).with_direction(direction));
    }
    options
}

// ---------------------------------------------------------------------------
// Test: determinism
// ---------------------------------------------------------------------------

/// Every algorithm except force returns identical positions for identical
/// input, with no seed involved.
#[test]
fn non_force_algorithms_are_deterministic() {
    let model = sample_model();
    let view = space_view(&model, &JobTracker::new());
    let dims = sample_dims();

    for algorithm in LayoutAlgorithm::ALL {
        if algorithm == LayoutAlgorithm::Force {
            continue;
        }
        let first = layout(&view, &dims, LayoutOptions::new(algorithm));
        let second = layout(&view, &dims, LayoutOptions::new(algorithm));
        assert_eq!(first, second, "{algorithm} is not deterministic");
    }
}

// ---------------------------------------------------------------------------
// Test: orphan placement
// ---------------------------------------------------------------------------

/// Isolated nodes never overlap the bounding box of the connected layout.
#[test]
fn orphans_stay_clear_of_connected_bounds() {
    let model = sample_model();
    let view = space_view(&model, &JobTracker::new());
    let dims = sample_dims();
    let orphans = ["o1", "o2", "o3"];

    for options in all_options() {
        let result = layout(&view, &dims, options);
        let connected: Rect = result
            .nodes
            .iter()
            .filter(|n| !orphans.contains(&n.node.id.as_str()))
            .map(|n| n.rect())
            .reduce(|a, b| a.union(&b))
            .unwrap();

        for id in orphans {
            let orphan = result.node(id).unwrap().rect();
            assert!(
                !orphan.intersects(&connected),
                "{options:?}: orphan {id} at {orphan:?} overlaps {connected:?}"
            );
        }
    }
}

/// Orphans are ordered by asset name: "Anchor" variants before "Lighthouse".
#[test]
fn orphans_are_sorted_by_asset_name() {
    let model = sample_model();
    let view = space_view(&model, &JobTracker::new());
    let result = layout(&view, &sample_dims(), LayoutOptions::new(LayoutAlgorithm::Grid));

    let o1 = result.node("o1").unwrap();
    let o2 = result.node("o2").unwrap();
    let o3 = result.node("o3").unwrap();
    assert_eq!(o1.y, o2.y);
    assert!(o1.x < o2.x);
    assert!(o2.x < o3.x);
}

// ---------------------------------------------------------------------------
// Test: no overlap among connected nodes
// ---------------------------------------------------------------------------

#[test]
fn connected_nodes_do_not_overlap() {
    let model = sample_model();
    let view = space_view(&model, &JobTracker::new());
    let dims = sample_dims();

    for options in all_options() {
        let result = layout(&view, &dims, options);
        for (i, a) in result.nodes.iter().enumerate() {
            for b in &result.nodes[i + 1..] {
                assert!(
                    !a.rect().intersects(&b.rect()),
                    "{options:?}: {} overlaps {}",
                    a.node.id,
                    b.node.id
                );
            }
        }
    }
}

/// Parallel edges with different relation types both survive layout.
#[test]
fn parallel_edges_are_kept() {
    let model = sample_model();
    let view = space_view(&model, &JobTracker::new());
    let result = layout(&view, &sample_dims(), LayoutOptions::default());
    let between: Vec<_> = result
        .edges
        .iter()
        .filter(|e| e.source == "v1" && e.target == "v2")
        .collect();
    assert_eq!(between.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: scenarios
// ---------------------------------------------------------------------------

/// One asset, one completed variant, no lineage: a single node at the
/// origin and no edges.
#[test]
fn single_variant_snapshot_lays_out_one_node() {
    let mut model = GraphModel::new();
    model.apply_snapshot(
        vec![asset("a1", "Solo")],
        vec![variant("v1", "a1", VariantStatus::Completed)],
        Some(vec![]),
    );

    let view = space_view(&model, &JobTracker::new());
    let result = layout(&view, &DimensionMap::new(), LayoutOptions::default());

    assert_eq!(result.nodes.len(), 1);
    assert!(result.edges.is_empty());
    let node = &result.nodes[0];
    assert_eq!((node.x, node.y), (0.0, 0.0));
    assert_eq!((node.width, node.height), (140.0, 140.0));
}

/// A derived edge from a variant of another asset renders as an external
/// ghost node with one dashed edge.
#[test]
fn cross_asset_parent_renders_as_ghost() {
    let mut model = GraphModel::new();
    model.apply_snapshot(
        vec![asset("a1", "Source"), asset("a2", "Viewed")],
        vec![
            variant("v1", "a1", VariantStatus::Completed),
            variant("v2", "a2", VariantStatus::Completed),
        ],
        Some(vec![derived("e1", "v1", "v2")]),
    );

    let view = asset_lineage_view(&model, &JobTracker::new(), "a2");
    let result = layout(&view, &DimensionMap::new(), LayoutOptions::default());

    let ghost = result.node("v1").unwrap();
    assert!(ghost.node.is_external());
    assert!(!result.node("v2").unwrap().node.is_external());
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].style, EdgeStyle::Dashed);
    assert!(ghost.y < result.node("v2").unwrap().y);
}

/// A processing job for an asset marks it generating until a completed
/// variant for that asset arrives.
#[test]
fn generating_flag_follows_job_lifecycle() {
    let mut model = GraphModel::new();
    model.apply_snapshot(vec![asset("a1", "Hero")], vec![], None);

    let mut jobs = JobTracker::new();
    jobs.submit("req-1", Some("a1".into()), None, None);
    jobs.acknowledge("req-1", "job-1", None);
    jobs.update_status("job-1", JobStatus::Processing, None);
    assert!(jobs.is_generating(Some("a1"), None));

    let view = asset_lineage_view(&model, &jobs, "a1");
    assert_eq!(view.nodes.len(), 1);
    assert!(view.nodes[0].generating);

    let landed = variant("v1", "a1", VariantStatus::Completed);
    model.upsert_variant(landed.clone());
    jobs.resolve_with_variant(&landed);
    assert!(!jobs.is_generating(Some("a1"), None));

    let view = asset_lineage_view(&model, &jobs, "a1");
    assert_eq!(view.nodes.len(), 1);
    assert_eq!(view.nodes[0].id, "v1");
    assert!(!view.nodes[0].generating);
}
