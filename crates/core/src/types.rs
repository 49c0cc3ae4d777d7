/// Server-assigned asset identifier.
pub type AssetId = String;

/// Server-assigned variant identifier.
pub type VariantId = String;

/// Server-assigned lineage edge identifier.
pub type EdgeId = String;

/// Generation job identifier (server job id, or the client request id
/// until the server acknowledges the request).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
