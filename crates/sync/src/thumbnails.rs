//! HTTP image probe for the dimension resolver.
//!
//! Fetches a thumbnail with [`reqwest`] and reads its natural size from
//! the encoded header.

use std::time::Duration;

use lineage_core::dimensions::{decode_dimensions, ImageProbe, ProbeError};

/// Per-request timeout for thumbnail fetches.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// [`ImageProbe`] backed by HTTP GET requests.
#[derive(Debug, Clone)]
pub struct HttpImageProbe {
    client: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpImageProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ImageProbe for HttpImageProbe {
    async fn natural_size(&self, url: &str) -> Result<(u32, u32), ProbeError> {
        let response = self
            .client
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProbeError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProbeError::Fetch(e.to_string()))?;
        decode_dimensions(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Serve one HTTP response on a loopback port and return its URL.
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nContent-Type: image/png\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/thumb.png")
    }

    #[tokio::test]
    async fn reads_size_from_served_png() {
        let url = serve_once("200 OK", png(3, 2)).await;
        let size = HttpImageProbe::new().natural_size(&url).await.unwrap();
        assert_eq!(size, (3, 2));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = serve_once("404 Not Found", Vec::new()).await;
        let result = HttpImageProbe::new().natural_size(&url).await;
        assert_matches!(result, Err(ProbeError::Status(404)));
    }

    #[tokio::test]
    async fn garbage_body_fails_to_decode() {
        let url = serve_once("200 OK", b"definitely not an image".to_vec()).await;
        let result = HttpImageProbe::new().natural_size(&url).await;
        assert_matches!(result, Err(ProbeError::Decode(_)));
    }
}
