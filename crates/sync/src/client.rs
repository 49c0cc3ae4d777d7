//! WebSocket client for one space.
//!
//! [`SyncClient`] holds the endpoint configuration. Call
//! [`SyncClient::connect`] to open a live [`SyncConnection`].

use reqwest::Url;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for one space.
#[derive(Debug, Clone)]
pub struct SyncClient {
    ws_url: String,
    space_id: String,
    token: Option<String>,
}

/// A live WebSocket connection.
#[derive(Debug)]
pub struct SyncConnection {
    /// Connection attempt counter value this connection belongs to.
    pub generation: u64,
    pub ws_stream: WsStream,
}

impl SyncClient {
    /// * `ws_url`   - WebSocket base URL, e.g. `ws://host:3000`.
    /// * `space_id` - space to mirror.
    /// * `token`    - optional credential, sent as the `token` query parameter.
    pub fn new(ws_url: impl Into<String>, space_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            space_id: space_id.into(),
            token,
        }
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full endpoint: `{ws_url}/spaces/{space_id}/ws[?token=...]`.
    pub fn endpoint(&self) -> Result<Url, SyncClientError> {
        let mut url = Url::parse(&self.ws_url)
            .map_err(|e| SyncClientError::InvalidUrl(format!("{}: {e}", self.ws_url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(SyncClientError::InvalidUrl(format!(
                "{}: scheme must be ws or wss",
                self.ws_url
            )));
        }
        url.path_segments_mut()
            .map_err(|_| SyncClientError::InvalidUrl(self.ws_url.clone()))?
            .pop_if_empty()
            .extend(["spaces", self.space_id.as_str(), "ws"]);
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    /// Open the WebSocket for connection attempt `generation`.
    pub async fn connect(&self, generation: u64) -> Result<SyncConnection, SyncClientError> {
        let url = self.endpoint()?;

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            SyncClientError::Connection(format!(
                "Failed to connect to sync server at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            space_id = %self.space_id,
            generation,
            "Connected to sync server at {}",
            self.ws_url,
        );

        Ok(SyncConnection {
            generation,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum SyncClientError {
    /// The configured base URL cannot be turned into an endpoint.
    #[error("Invalid sync URL: {0}")]
    InvalidUrl(String),

    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
