//! Sync protocol message types and parser.
//!
//! Every frame is a JSON text message discriminated by a `"type"` field,
//! with the payload fields alongside it, e.g.
//! `{"type": "asset:deleted", "assetId": "a1"}`. Inbound frames parse into
//! [`ServerMessage`]; outbound requests serialize from [`ClientMessage`].

use lineage_core::jobs::JobStatus;
use lineage_core::model::{Asset, AssetType, LineageEdge, Variant};
use lineage_core::types::{AssetId, EdgeId, JobId, VariantId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// All server message kinds the client acts on.
///
/// Types this client does not know deserialize to [`ServerMessage::Unknown`]
/// so newer servers do not break older clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full state of the space. Replaces the local model.
    #[serde(rename = "sync:state")]
    SyncState(SyncStateData),

    #[serde(rename = "asset:created")]
    AssetCreated { asset: Asset },

    #[serde(rename = "asset:updated")]
    AssetUpdated { asset: Asset },

    #[serde(rename = "asset:deleted", rename_all = "camelCase")]
    AssetDeleted { asset_id: AssetId },

    #[serde(rename = "variant:created")]
    VariantCreated { variant: Variant },

    /// Status or metadata change of an existing variant.
    #[serde(rename = "variant:updated")]
    VariantUpdated { variant: Variant },

    #[serde(rename = "variant:deleted", rename_all = "camelCase")]
    VariantDeleted { variant_id: VariantId },

    #[serde(rename = "lineage:created")]
    LineageCreated { lineage: LineageEdge },

    /// The edge stays in the model flagged as severed.
    #[serde(rename = "lineage:severed", rename_all = "camelCase")]
    LineageSevered { lineage_id: EdgeId },

    /// Acknowledgement of a generation request: the server job id for the
    /// client's request id.
    #[serde(rename = "generate:started", rename_all = "camelCase")]
    GenerateStarted {
        request_id: String,
        job_id: JobId,
        #[serde(default)]
        asset_id: Option<AssetId>,
    },

    #[serde(rename = "job:progress", rename_all = "camelCase")]
    JobProgress {
        job_id: JobId,
        #[serde(default)]
        status: Option<JobStatus>,
        /// Completion in percent, when the backend reports it.
        #[serde(default)]
        progress: Option<f64>,
    },

    #[serde(rename = "job:completed", rename_all = "camelCase")]
    JobCompleted {
        job_id: JobId,
        #[serde(default)]
        variant_id: Option<VariantId>,
    },

    #[serde(rename = "job:failed", rename_all = "camelCase")]
    JobFailed {
        job_id: JobId,
        #[serde(default)]
        error: Option<String>,
    },

    /// Server-side failure report.
    #[serde(rename = "error")]
    Error(ErrorData),

    #[serde(other)]
    Unknown,
}

/// Payload of `sync:state`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncStateData {
    pub assets: Vec<Asset>,
    pub variants: Vec<Variant>,
    /// Older servers omit lineage from snapshots.
    #[serde(default)]
    pub lineage: Option<Vec<LineageEdge>>,
}

/// Payload of `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub code: String,
    pub message: String,
}

/// Parse a sync text frame into a typed message.
///
/// Returns `Err` for malformed JSON or a known type with a malformed
/// payload. Callers should log and continue.
pub fn parse_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Requests the client sends. All are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "asset:create", rename_all = "camelCase")]
    AssetCreate {
        name: String,
        asset_type: AssetType,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_asset_id: Option<AssetId>,
    },

    /// Only the fields that are `Some` change.
    #[serde(rename = "asset:update", rename_all = "camelCase")]
    AssetUpdate {
        asset_id: AssetId,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_asset_id: Option<AssetId>,
    },

    #[serde(rename = "asset:delete", rename_all = "camelCase")]
    AssetDelete { asset_id: AssetId },

    /// `variant_id: None` clears the active variant.
    #[serde(rename = "asset:setActive", rename_all = "camelCase")]
    AssetSetActive {
        asset_id: AssetId,
        variant_id: Option<VariantId>,
    },

    #[serde(rename = "variant:delete", rename_all = "camelCase")]
    VariantDelete { variant_id: VariantId },

    #[serde(rename = "variant:star", rename_all = "camelCase")]
    VariantStar { variant_id: VariantId, starred: bool },

    /// Ask for a fresh `sync:state`.
    #[serde(rename = "sync:request")]
    SyncRequest,

    #[serde(rename = "generate:request")]
    Generate(GenerateRequest),

    #[serde(rename = "refine:request")]
    Refine(RefineRequest),

    #[serde(rename = "fork:request")]
    Fork(ForkRequest),

    #[serde(rename = "batch:request")]
    Batch(BatchRequest),
}

impl ClientMessage {
    /// Wire name of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssetCreate { .. } => "asset:create",
            Self::AssetUpdate { .. } => "asset:update",
            Self::AssetDelete { .. } => "asset:delete",
            Self::AssetSetActive { .. } => "asset:setActive",
            Self::VariantDelete { .. } => "variant:delete",
            Self::VariantStar { .. } => "variant:star",
            Self::SyncRequest => "sync:request",
            Self::Generate(_) => "generate:request",
            Self::Refine(_) => "refine:request",
            Self::Fork(_) => "fork:request",
            Self::Batch(_) => "batch:request",
        }
    }

    /// Client request id of a generation request.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Generate(r) => Some(&r.request_id),
            Self::Refine(r) => Some(&r.request_id),
            Self::Fork(r) => Some(&r.request_id),
            Self::Batch(r) => Some(&r.request_id),
            _ => None,
        }
    }
}

/// Generate a new variant from a prompt.
///
/// Without `asset_id` the server creates a new asset named `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_variant_ids: Vec<VariantId>,
}

impl GenerateRequest {
    /// A request with a fresh request id and no optional fields.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            request_id: new_request_id(),
            asset_id: None,
            name: None,
            asset_type: None,
            prompt: prompt.into(),
            model: None,
            aspect_ratio: None,
            reference_variant_ids: Vec::new(),
        }
    }

    pub fn for_asset(mut self, asset_id: impl Into<AssetId>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, asset_type: AssetType) -> Self {
        self.name = Some(name.into());
        self.asset_type = Some(asset_type);
        self
    }

    pub fn with_references(mut self, variant_ids: Vec<VariantId>) -> Self {
        self.reference_variant_ids = variant_ids;
        self
    }
}

/// Derive a new variant of the same asset from an existing one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub request_id: String,
    pub asset_id: AssetId,
    pub source_variant_id: VariantId,
    pub prompt: String,
}

/// Start a new asset from an existing variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkRequest {
    pub request_id: String,
    pub source_variant_id: VariantId,
    pub name: String,
    pub asset_type: AssetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_asset_id: Option<AssetId>,
}

/// Several generations of the same prompt for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub request_id: String,
    pub asset_id: AssetId,
    pub prompt: String,
    pub count: u32,
}

/// Fresh client request id (UUID v4).
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
