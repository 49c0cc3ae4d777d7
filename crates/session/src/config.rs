use std::collections::HashMap;
use std::str::FromStr;

use lineage_layout::view::ViewScope;
use lineage_layout::{Direction, LayoutAlgorithm, LayoutOptions};
use lineage_sync::reconnect::ReconnectConfig;

/// Default base URL for thumbnail content keys.
pub const DEFAULT_THUMBNAIL_BASE_URL: &str = "http://localhost:3000/api/images";

/// Errors from reading session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Log output format of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Session configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket base URL of the sync server.
    pub ws_url: String,
    pub space_id: String,
    /// Appended to the connect URL as `?token=`.
    pub auth_token: Option<String>,
    pub thumbnail_base_url: String,
    pub layout: LayoutOptions,
    pub view: ViewScope,
    pub reconnect: ReconnectConfig,
    pub log_format: LogFormat,
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                            |
    /// |--------------------------|------------------------------------|
    /// | `SYNC_WS_URL`            | required                           |
    /// | `SPACE_ID`               | required                           |
    /// | `AUTH_TOKEN`             | unset                              |
    /// | `THUMBNAIL_BASE_URL`     | `http://localhost:3000/api/images` |
    /// | `LAYOUT_ALGORITHM`       | `hierarchical`                     |
    /// | `LAYOUT_DIRECTION`       | `TB`                               |
    /// | `LAYOUT_SEED`            | unset (random force layout)        |
    /// | `VIEW_SCOPE`             | `space` (`space` or `tree`)        |
    /// | `VIEW_ASSET_ID`          | unset; when set, overrides `VIEW_SCOPE` with that asset's lineage |
    /// | `RECONNECT_MAX_ATTEMPTS` | `5`                                |
    /// | `LOG_FORMAT`             | `text` (`text` or `json`)          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading from a map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|var| vars.get(var).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset.
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let ws_url = get("SYNC_WS_URL").ok_or(ConfigError::Missing("SYNC_WS_URL"))?;
        let space_id = get("SPACE_ID").ok_or(ConfigError::Missing("SPACE_ID"))?;
        let auth_token = get("AUTH_TOKEN");
        let thumbnail_base_url =
            get("THUMBNAIL_BASE_URL").unwrap_or_else(|| DEFAULT_THUMBNAIL_BASE_URL.into());

        let algorithm: LayoutAlgorithm = parse_or(get("LAYOUT_ALGORITHM"), "LAYOUT_ALGORITHM")?;
        let direction: Direction = parse_or(get("LAYOUT_DIRECTION"), "LAYOUT_DIRECTION")?;
        let mut layout = LayoutOptions::new(algorithm).with_direction(direction);
        if let Some(seed) = get("LAYOUT_SEED") {
            layout = layout.with_seed(parse(&seed, "LAYOUT_SEED")?);
        }

        let view = match get("VIEW_ASSET_ID") {
            Some(asset_id) => ViewScope::Asset(asset_id),
            None => match get("VIEW_SCOPE").as_deref().map(str::trim) {
                None | Some("space") => ViewScope::Space,
                Some("tree") => ViewScope::Tree,
                Some(other) => {
                    return Err(ConfigError::Invalid {
                        var: "VIEW_SCOPE",
                        reason: format!("'{other}' is not one of: space, tree"),
                    })
                }
            },
        };

        let mut reconnect = ReconnectConfig::default();
        if let Some(max) = get("RECONNECT_MAX_ATTEMPTS") {
            reconnect.max_attempts = parse(&max, "RECONNECT_MAX_ATTEMPTS")?;
        }

        let log_format: LogFormat = parse_or(get("LOG_FORMAT"), "LOG_FORMAT")?;

        Ok(Self {
            ws_url,
            space_id,
            auth_token,
            thumbnail_base_url,
            layout,
            view,
            reconnect,
            log_format,
        })
    }
}

fn parse<T>(raw: &str, var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

/// Parse when present, otherwise the type's default.
fn parse_or<T>(raw: Option<String>, var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    raw.map_or_else(|| Ok(T::default()), |raw| parse(&raw, var))
}
