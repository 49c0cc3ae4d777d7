//! In-memory mirror of one space's assets, variants and lineage edges.
//!
//! [`GraphModel`] is the single owner of mutable graph state. Every
//! mutation is keyed by id and idempotent, so replaying a server event
//! leaves the model unchanged. Derived indices (variants by asset, edges
//! by variant) are maintained alongside the primary maps.
//!
//! Edges whose endpoints are missing are dropped rather than reported:
//! deletes and edge arrivals can race over the wire.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::CoreError;
use crate::model::entities::{Asset, LineageEdge, Variant};
use crate::types::{AssetId, EdgeId, VariantId};

/// Incoming and outgoing lineage edges of one variant.
#[derive(Debug, Default)]
pub struct VariantLineage<'a> {
    /// Edges where the variant is the child.
    pub parents: Vec<&'a LineageEdge>,
    /// Edges where the variant is the parent.
    pub children: Vec<&'a LineageEdge>,
}

/// Authoritative client-side graph state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphModel {
    assets: HashMap<AssetId, Asset>,
    variants: HashMap<VariantId, Variant>,
    lineage: HashMap<EdgeId, LineageEdge>,
    variants_by_asset: HashMap<AssetId, BTreeSet<VariantId>>,
    edges_by_variant: HashMap<VariantId, BTreeSet<EdgeId>>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- snapshot ----

    /// Replace the whole model with a server snapshot.
    ///
    /// When `lineage` is `None` the snapshot did not carry edges; the
    /// existing edges are kept as long as both endpoints survive.
    pub fn apply_snapshot(
        &mut self,
        assets: Vec<Asset>,
        variants: Vec<Variant>,
        lineage: Option<Vec<LineageEdge>>,
    ) {
        let edges: Vec<LineageEdge> = match lineage {
            Some(edges) => edges,
            None => self.lineage.drain().map(|(_, edge)| edge).collect(),
        };

        self.assets.clear();
        self.variants.clear();
        self.lineage.clear();
        self.variants_by_asset.clear();
        self.edges_by_variant.clear();

        for asset in assets {
            self.assets.insert(asset.id.clone(), asset);
        }
        for variant in variants {
            self.index_variant(&variant);
            self.variants.insert(variant.id.clone(), variant);
        }

        let mut dropped = 0usize;
        for edge in edges {
            if !self.insert_edge(edge) {
                dropped += 1;
            }
        }

        tracing::debug!(
            assets = self.assets.len(),
            variants = self.variants.len(),
            edges = self.lineage.len(),
            dropped_edges = dropped,
            "Applied graph snapshot",
        );
    }

    // ---- assets ----

    /// Insert or replace an asset.
    ///
    /// Rejects a parent link that would close a cycle in the asset tree.
    /// An `active_variant_id` pointing at a known variant of another asset
    /// is cleared. Returns whether the stored asset changed.
    pub fn upsert_asset(&mut self, mut asset: Asset) -> Result<bool, CoreError> {
        if let Some(parent_id) = asset.parent_asset_id.as_deref() {
            if self.would_create_cycle(&asset.id, parent_id) {
                return Err(CoreError::Conflict(format!(
                    "Setting parent of asset {} to {parent_id} would create a cycle",
                    asset.id
                )));
            }
        }

        if let Some(active_id) = asset.active_variant_id.as_deref() {
            if let Some(variant) = self.variants.get(active_id) {
                if variant.asset_id != asset.id {
                    tracing::warn!(
                        asset_id = %asset.id,
                        variant_id = %active_id,
                        owner = %variant.asset_id,
                        "Active variant belongs to another asset, clearing",
                    );
                    asset.active_variant_id = None;
                }
            }
        }

        if self.assets.get(&asset.id) == Some(&asset) {
            return Ok(false);
        }
        self.assets.insert(asset.id.clone(), asset);
        Ok(true)
    }

    /// Remove an asset together with its variants and their edges.
    ///
    /// Child assets are left in place; with their parent gone they are
    /// reported as roots.
    pub fn remove_asset(&mut self, asset_id: &str) -> bool {
        if self.assets.remove(asset_id).is_none() {
            return false;
        }
        let owned = self.variants_by_asset.remove(asset_id).unwrap_or_default();
        for variant_id in owned {
            self.remove_variant_inner(&variant_id);
        }
        true
    }

    /// Point an asset at one of its own variants, or clear the pointer.
    pub fn set_active_variant(
        &mut self,
        asset_id: &str,
        variant_id: Option<&str>,
    ) -> Result<(), CoreError> {
        if let Some(variant_id) = variant_id {
            let variant = self.variants.get(variant_id).ok_or(CoreError::NotFound {
                entity: "variant",
                id: variant_id.to_string(),
            })?;
            if variant.asset_id != asset_id {
                return Err(CoreError::Validation(format!(
                    "Variant {variant_id} belongs to asset {}, not {asset_id}",
                    variant.asset_id
                )));
            }
        }
        let asset = self.assets.get_mut(asset_id).ok_or(CoreError::NotFound {
            entity: "asset",
            id: asset_id.to_string(),
        })?;
        asset.active_variant_id = variant_id.map(str::to_string);
        Ok(())
    }

    // ---- variants ----

    /// Insert or replace a variant.
    ///
    /// A status that would move the variant backwards in its lifecycle is
    /// ignored; the other fields are still applied. Returns whether the
    /// stored variant changed.
    pub fn upsert_variant(&mut self, mut variant: Variant) -> bool {
        if let Some(existing) = self.variants.get(&variant.id) {
            if existing.status.is_regression_to(variant.status) {
                tracing::debug!(
                    variant_id = %variant.id,
                    current = ?existing.status,
                    incoming = ?variant.status,
                    "Ignoring variant status regression",
                );
                variant.status = existing.status;
            }
            if existing == &variant {
                return false;
            }
            if existing.asset_id != variant.asset_id {
                let old_asset = existing.asset_id.clone();
                if let Some(set) = self.variants_by_asset.get_mut(&old_asset) {
                    set.remove(&variant.id);
                    if set.is_empty() {
                        self.variants_by_asset.remove(&old_asset);
                    }
                }
            }
        }
        self.index_variant(&variant);
        self.variants.insert(variant.id.clone(), variant);
        true
    }

    /// Remove a variant, its incident edges, and any active pointer at it.
    pub fn remove_variant(&mut self, variant_id: &str) -> bool {
        let Some(asset_id) = self.variants.get(variant_id).map(|v| v.asset_id.clone()) else {
            return false;
        };
        if let Some(set) = self.variants_by_asset.get_mut(&asset_id) {
            set.remove(variant_id);
            if set.is_empty() {
                self.variants_by_asset.remove(&asset_id);
            }
        }
        self.remove_variant_inner(variant_id);
        true
    }

    // ---- lineage ----

    /// Insert or replace a lineage edge. Edges with an unknown endpoint
    /// are dropped; returns whether the stored edge changed.
    pub fn upsert_lineage(&mut self, edge: LineageEdge) -> bool {
        if self.lineage.get(&edge.id) == Some(&edge) {
            return false;
        }
        if let Some(previous) = self.lineage.remove(&edge.id) {
            self.unindex_edge(&previous);
        }
        self.insert_edge(edge)
    }

    /// Soft-delete an edge. Returns whether anything changed.
    pub fn sever_lineage(&mut self, edge_id: &str) -> bool {
        match self.lineage.get_mut(edge_id) {
            Some(edge) if !edge.severed => {
                edge.severed = true;
                true
            }
            _ => false,
        }
    }

    // ---- lookups ----

    pub fn asset(&self, asset_id: &str) -> Option<&Asset> {
        self.assets.get(asset_id)
    }

    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.get(variant_id)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&LineageEdge> {
        self.lineage.get(edge_id)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn edge_count(&self) -> usize {
        self.lineage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.variants.is_empty()
    }

    // ---- derived views ----

    /// Direct children of an asset, ordered by name then id.
    pub fn children_of(&self, asset_id: &str) -> Vec<&Asset> {
        let mut children: Vec<&Asset> = self
            .assets
            .values()
            .filter(|a| a.parent_asset_id.as_deref() == Some(asset_id) && a.id != asset_id)
            .collect();
        sort_assets(&mut children);
        children
    }

    /// Assets with no parent, or whose parent is not in the model.
    /// Assets caught in a parent cycle are never roots.
    pub fn roots(&self) -> Vec<&Asset> {
        let mut roots: Vec<&Asset> = self
            .assets
            .values()
            .filter(|a| match a.parent_asset_id.as_deref() {
                None => true,
                Some(parent) => !self.assets.contains_key(parent),
            })
            .collect();
        sort_assets(&mut roots);
        roots
    }

    /// Variants owned by an asset, ordered by creation time then id.
    pub fn variants_of(&self, asset_id: &str) -> Vec<&Variant> {
        let mut variants: Vec<&Variant> = self
            .variants_by_asset
            .get(asset_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.variants.get(id))
            .collect();
        variants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        variants
    }

    /// Lineage edges around a variant, severed ones only when asked.
    pub fn lineage_of(&self, variant_id: &str, include_severed: bool) -> VariantLineage<'_> {
        let mut lineage = VariantLineage::default();
        let Some(edge_ids) = self.edges_by_variant.get(variant_id) else {
            return lineage;
        };
        for edge in edge_ids.iter().filter_map(|id| self.lineage.get(id)) {
            if edge.severed && !include_severed {
                continue;
            }
            if !self.endpoints_exist(edge) {
                continue;
            }
            if edge.child_variant_id == variant_id {
                lineage.parents.push(edge);
            }
            if edge.parent_variant_id == variant_id {
                lineage.children.push(edge);
            }
        }
        lineage
    }

    /// Look a variant up in the global pool together with its owning asset.
    ///
    /// Used for lineage edges that cross asset boundaries.
    pub fn resolve_ghost(&self, variant_id: &str) -> Option<(&Variant, &Asset)> {
        let variant = self.variants.get(variant_id)?;
        let asset = self.assets.get(&variant.asset_id)?;
        Some((variant, asset))
    }

    /// Non-severed edges with both endpoints present, ordered by id.
    pub fn active_edges(&self) -> Vec<&LineageEdge> {
        let mut edges: Vec<&LineageEdge> = self
            .lineage
            .values()
            .filter(|e| !e.severed && self.endpoints_exist(e))
            .collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        edges
    }

    /// Parent chain of an asset, nearest first. Stops at a missing parent
    /// or at the first revisited id.
    pub fn ancestors(&self, asset_id: &str) -> Vec<&Asset> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(asset_id);

        let mut current = self.assets.get(asset_id);
        while let Some(asset) = current {
            let Some(parent_id) = asset.parent_asset_id.as_deref() else {
                break;
            };
            if !seen.insert(parent_id) {
                break;
            }
            current = self.assets.get(parent_id);
            if let Some(parent) = current {
                chain.push(parent);
            }
        }
        chain
    }

    /// Whether following parent links from `asset_id` revisits an id.
    pub fn has_parent_cycle(&self, asset_id: &str) -> bool {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = asset_id;
        loop {
            if !seen.insert(current) {
                return true;
            }
            match self
                .assets
                .get(current)
                .and_then(|a| a.parent_asset_id.as_deref())
            {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // ---- private helpers ----

    fn would_create_cycle(&self, asset_id: &str, parent_id: &str) -> bool {
        if parent_id == asset_id {
            return true;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = parent_id;
        loop {
            if current == asset_id {
                return true;
            }
            if !seen.insert(current) {
                // Pre-existing cycle above us that does not include this asset.
                return false;
            }
            match self
                .assets
                .get(current)
                .and_then(|a| a.parent_asset_id.as_deref())
            {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    fn endpoints_exist(&self, edge: &LineageEdge) -> bool {
        self.variants.contains_key(&edge.parent_variant_id)
            && self.variants.contains_key(&edge.child_variant_id)
    }

    fn index_variant(&mut self, variant: &Variant) {
        self.variants_by_asset
            .entry(variant.asset_id.clone())
            .or_default()
            .insert(variant.id.clone());
    }

    fn insert_edge(&mut self, edge: LineageEdge) -> bool {
        if !self.endpoints_exist(&edge) {
            tracing::debug!(
                edge_id = %edge.id,
                parent = %edge.parent_variant_id,
                child = %edge.child_variant_id,
                "Dropping lineage edge with missing endpoint",
            );
            return false;
        }
        for endpoint in [&edge.parent_variant_id, &edge.child_variant_id] {
            self.edges_by_variant
                .entry(endpoint.clone())
                .or_default()
                .insert(edge.id.clone());
        }
        self.lineage.insert(edge.id.clone(), edge);
        true
    }

    fn unindex_edge(&mut self, edge: &LineageEdge) {
        for endpoint in [&edge.parent_variant_id, &edge.child_variant_id] {
            if let Some(set) = self.edges_by_variant.get_mut(endpoint) {
                set.remove(&edge.id);
                if set.is_empty() {
                    self.edges_by_variant.remove(endpoint);
                }
            }
        }
    }

    /// Drop a variant and every edge touching it. The caller has already
    /// removed it from `variants_by_asset`.
    fn remove_variant_inner(&mut self, variant_id: &str) {
        let Some(variant) = self.variants.remove(variant_id) else {
            return;
        };

        let edge_ids = self.edges_by_variant.remove(variant_id).unwrap_or_default();
        for edge_id in edge_ids {
            if let Some(edge) = self.lineage.remove(&edge_id) {
                self.unindex_edge(&edge);
            }
        }

        if let Some(asset) = self.assets.get_mut(&variant.asset_id) {
            if asset.active_variant_id.as_deref() == Some(variant_id) {
                asset.active_variant_id = None;
            }
        }
    }
}

fn sort_assets(assets: &mut [&Asset]) {
    assets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
