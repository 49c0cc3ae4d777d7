//! Thumbnail measurement for layout node sizing.
//!
//! Lineage nodes are thumbnails whose width follows the image aspect
//! ratio, which is only known once the image header has been read.
//! [`DimensionResolver`] probes every distinct thumbnail URL of a node set
//! concurrently and publishes the resulting width/height map in one piece
//! once the whole batch has settled. A newer batch supersedes an older one
//! still in flight; the older result is discarded rather than published.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::model::Variant;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed on-screen thumbnail height in pixels.
pub const THUMB_BASE_HEIGHT: f64 = 140.0;

/// Narrowest thumbnail width (very tall images).
pub const MIN_THUMB_WIDTH: f64 = 80.0;

/// Widest thumbnail width (panoramas).
pub const MAX_THUMB_WIDTH: f64 = 280.0;

/// Width used when no measurement is available.
pub const DEFAULT_NODE_WIDTH: f64 = 140.0;

/// Height used when no measurement is available.
pub const DEFAULT_NODE_HEIGHT: f64 = 140.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rendered size of one layout node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeDimensions {
    pub width: f64,
    pub height: f64,
}

impl NodeDimensions {
    pub const DEFAULT: NodeDimensions = NodeDimensions {
        width: DEFAULT_NODE_WIDTH,
        height: DEFAULT_NODE_HEIGHT,
    };
}

impl Default for NodeDimensions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Node id -> measured size.
pub type DimensionMap = HashMap<String, NodeDimensions>;

/// One node to measure. `url` is absent for variants without an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionRequest {
    pub node_id: String,
    pub url: Option<String>,
}

impl DimensionRequest {
    pub fn new(node_id: impl Into<String>, url: Option<String>) -> Self {
        Self {
            node_id: node_id.into(),
            url,
        }
    }
}

/// Sizing rules applied to measured images.
#[derive(Debug, Clone, Copy)]
pub struct DimensionConfig {
    pub base_height: f64,
    pub min_width: f64,
    pub max_width: f64,
    pub fallback: NodeDimensions,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            base_height: THUMB_BASE_HEIGHT,
            min_width: MIN_THUMB_WIDTH,
            max_width: MAX_THUMB_WIDTH,
            fallback: NodeDimensions::DEFAULT,
        }
    }
}

impl DimensionConfig {
    /// Node size for an image of the given natural size. Unknown or
    /// degenerate sizes fall back to the default.
    pub fn size_for(&self, natural: Option<(u32, u32)>) -> NodeDimensions {
        match natural {
            Some((w, h)) if w > 0 && h > 0 => {
                let aspect = f64::from(w) / f64::from(h);
                NodeDimensions {
                    width: (self.base_height * aspect).clamp(self.min_width, self.max_width),
                    height: self.base_height,
                }
            }
            _ => self.fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Errors from reading an image's natural size.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The image could not be fetched.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The image host answered with a non-2xx status.
    #[error("Image host returned status {0}")]
    Status(u16),

    /// The bytes did not contain a readable image header.
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Reads the natural pixel size of an image.
#[async_trait::async_trait]
pub trait ImageProbe: Send + Sync {
    async fn natural_size(&self, url: &str) -> Result<(u32, u32), ProbeError>;
}

/// Maps a variant to the URL of its thumbnail.
pub trait ThumbnailUrls: Send + Sync {
    /// `None` unless the variant has a displayable image.
    fn thumbnail_url(&self, variant: &Variant) -> Option<String>;
}

/// Joins a base URL and the variant's thumbnail content key.
#[derive(Debug, Clone)]
pub struct PrefixThumbnailUrls {
    base_url: String,
}

impl PrefixThumbnailUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ThumbnailUrls for PrefixThumbnailUrls {
    fn thumbnail_url(&self, variant: &Variant) -> Option<String> {
        let key = variant.display_key()?;
        Some(format!("{}/{}", self.base_url, key.trim_start_matches('/')))
    }
}

/// Read width/height from an encoded image header without decoding pixels.
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ProbeError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ProbeError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Batches image probes and publishes complete dimension maps.
pub struct DimensionResolver<P> {
    probe: P,
    config: DimensionConfig,
    latest_batch: AtomicU64,
    published: watch::Sender<Arc<DimensionMap>>,
}

impl<P: ImageProbe> DimensionResolver<P> {
    pub fn new(probe: P, config: DimensionConfig) -> Self {
        let (published, _) = watch::channel(Arc::new(DimensionMap::new()));
        Self {
            probe,
            config,
            latest_batch: AtomicU64::new(0),
            published,
        }
    }

    /// Receive every published map.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DimensionMap>> {
        self.published.subscribe()
    }

    /// Most recently published map.
    pub fn current(&self) -> Arc<DimensionMap> {
        self.published.borrow().clone()
    }

    pub fn config(&self) -> &DimensionConfig {
        &self.config
    }

    /// Measure a node set and publish the full map.
    ///
    /// Every distinct URL is probed once, all probes run concurrently, and
    /// nothing is published until all of them settle. Failed probes and
    /// nodes without a URL get the fallback size. Returns `None` when a
    /// newer batch started while this one was in flight.
    pub async fn resolve(&self, requests: Vec<DimensionRequest>) -> Option<Arc<DimensionMap>> {
        let batch = self.latest_batch.fetch_add(1, Ordering::SeqCst) + 1;

        let urls: BTreeSet<&str> = requests.iter().filter_map(|r| r.url.as_deref()).collect();
        let probes = urls.iter().map(|url| async move {
            let result = self.probe.natural_size(url).await;
            if let Err(ref e) = result {
                tracing::debug!(url, error = %e, "Thumbnail probe failed, using default size");
            }
            (*url, result.ok())
        });
        let measured: HashMap<&str, Option<(u32, u32)>> =
            futures::future::join_all(probes).await.into_iter().collect();

        let map: DimensionMap = requests
            .iter()
            .map(|request| {
                let natural = request
                    .url
                    .as_deref()
                    .and_then(|url| measured.get(url).copied().flatten());
                (request.node_id.clone(), self.config.size_for(natural))
            })
            .collect();

        if self.latest_batch.load(Ordering::SeqCst) != batch {
            tracing::debug!(batch, "Dimension batch superseded, discarding");
            return None;
        }

        let map = Arc::new(map);
        self.published.send_replace(Arc::clone(&map));
        tracing::debug!(batch, nodes = map.len(), probed = urls.len(), "Published dimensions");
        Some(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
