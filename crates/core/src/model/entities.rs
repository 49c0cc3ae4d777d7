//! Wire-shaped entity types mirrored from the server of record.
//!
//! Field names follow the server's camelCase JSON. Optional timestamps
//! and flags default when absent so partially-populated payloads still
//! deserialize.

use serde::{Deserialize, Serialize};

use crate::recipe::{parse_recipe, Recipe};
use crate::types::{AssetId, EdgeId, JobId, Timestamp, VariantId};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Kind of asset in the project hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Character,
    Item,
    Scene,
    Composite,
    Environment,
    Prop,
    /// Any kind this client does not know about yet.
    #[serde(other)]
    Other,
}

/// Lifecycle status of a variant, pushed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Uploading,
}

impl VariantStatus {
    /// Position in the forward-only lifecycle. Pushes never move a
    /// variant to a lower rank.
    fn rank(self) -> u8 {
        match self {
            Self::Pending | Self::Uploading => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Returns `true` when moving from `self` to `next` would go backwards.
    pub fn is_regression_to(self, next: VariantStatus) -> bool {
        next.rank() < self.rank()
    }

    /// Completed or failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Still waiting on the generator (or an upload).
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }
}

/// Provenance relation recorded on a lineage edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    /// Child was refined from the parent.
    #[serde(alias = "refined")]
    Derived,
    /// Child was composed from several parents.
    Composed,
    /// Child was spawned as a new asset from the parent.
    Spawned,
    /// Child was forked into a copy of the parent.
    Forked,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A named entity in the project hierarchy owning zero or more variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default)]
    pub parent_asset_id: Option<AssetId>,
    #[serde(default)]
    pub active_variant_id: Option<VariantId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// One concrete image belonging to exactly one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub asset_id: AssetId,
    pub status: VariantStatus,
    #[serde(default)]
    pub image_key: Option<String>,
    #[serde(default)]
    pub thumb_key: Option<String>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Raw JSON generation recipe as stored by the server.
    #[serde(default)]
    pub recipe: Option<String>,
    /// Job that produced this variant, when the server reports it.
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Variant {
    /// Parse the stored recipe string. Malformed recipes yield `None`.
    pub fn recipe(&self) -> Option<Recipe> {
        self.recipe.as_deref().and_then(parse_recipe)
    }

    /// Content key to render as a thumbnail, only once the image exists.
    pub fn display_key(&self) -> Option<&str> {
        if self.status != VariantStatus::Completed {
            return None;
        }
        self.thumb_key.as_deref().or(self.image_key.as_deref())
    }
}

/// Directed provenance relation between two variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    pub id: EdgeId,
    pub parent_variant_id: VariantId,
    pub child_variant_id: VariantId,
    pub relation_type: RelationType,
    /// Soft-deleted edges stay for audit but leave traversal and layout.
    #[serde(default)]
    pub severed: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl LineageEdge {
    /// Whether `variant_id` is either endpoint.
    pub fn touches(&self, variant_id: &str) -> bool {
        self.parent_variant_id == variant_id || self.child_variant_id == variant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_deserializes_from_camel_case() {
        let json = r#"{"id":"a1","name":"Hero","type":"character","parentAssetId":"root","activeVariantId":null}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.asset_type, AssetType::Character);
        assert_eq!(asset.parent_asset_id.as_deref(), Some("root"));
        assert!(asset.active_variant_id.is_none());
        assert!(asset.created_at.is_none());
    }

    #[test]
    fn unknown_asset_type_maps_to_other() {
        let json = r#"{"id":"a1","name":"Hero","type":"vehicle"}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.asset_type, AssetType::Other);
    }

    #[test]
    fn refined_is_an_alias_for_derived() {
        let json = r#"{"id":"e1","parentVariantId":"v1","childVariantId":"v2","relationType":"refined"}"#;
        let edge: LineageEdge = serde_json::from_str(json).unwrap();
        assert_eq!(edge.relation_type, RelationType::Derived);
        assert!(!edge.severed);
    }

    #[test]
    fn status_regressions() {
        assert!(VariantStatus::Completed.is_regression_to(VariantStatus::Processing));
        assert!(VariantStatus::Processing.is_regression_to(VariantStatus::Pending));
        assert!(!VariantStatus::Pending.is_regression_to(VariantStatus::Processing));
        assert!(!VariantStatus::Processing.is_regression_to(VariantStatus::Failed));
        assert!(!VariantStatus::Uploading.is_regression_to(VariantStatus::Completed));
    }

    #[test]
    fn display_key_requires_completed_status() {
        let mut variant: Variant = serde_json::from_str(
            r#"{"id":"v1","assetId":"a1","status":"processing","thumbKey":"t.png","imageKey":"i.png"}"#,
        )
        .unwrap();
        assert!(variant.display_key().is_none());

        variant.status = VariantStatus::Completed;
        assert_eq!(variant.display_key(), Some("t.png"));

        variant.thumb_key = None;
        assert_eq!(variant.display_key(), Some("i.png"));
    }
}
