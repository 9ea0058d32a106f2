// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{StatusCode, Url};

use super::{DataSource, SourceError};

const USER_AGENT: &str = concat!("flightmap/", env!("CARGO_PKG_VERSION"));

/// Snapshot tree served over HTTP, e.g. a static website bucket.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpSource {
    /// Create a source rooted at `base_url` with a 30 second request timeout.
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a source rooted at `base_url` with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| SourceError::InvalidLocation(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::InvalidLocation(base_url.to_string()));
        }
        // Relative joins drop the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Transport {
                url: base_url.to_string(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client, base })
    }

    /// Absolute URL of a resource path.
    ///
    /// Each `/`-separated segment is appended below the base path and
    /// percent-encoded, so `?` and `#` stay part of the file name. Empty and
    /// relative (`.`, `..`) segments are rejected.
    pub fn resource_url(&self, path: &str) -> Result<Url, SourceError> {
        let invalid = || SourceError::InvalidLocation(path.to_string());
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }
}

impl DataSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.resource_url(path)?;
        debug!("GET {url}");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!("Request for {url} failed: {e}");
            SourceError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SourceError::Transport {
                url: url.to_string(),
                message: format!("failed to read response: {e}"),
            })
    }

    fn location(&self) -> String {
        self.base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    #[test]
    fn test_resource_url_keeps_base_path() {
        let source = HttpSource::new("https://example.com/flightmap").unwrap();
        let url = source.resource_url("1490000000/aircraft_list_1490000000.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/flightmap/1490000000/aircraft_list_1490000000.json"
        );
    }

    #[test]
    fn test_resource_url_at_host_root() {
        let source = HttpSource::new("https://example.com").unwrap();
        let url = source.resource_url("latest.json").unwrap();
        assert_eq!(url.as_str(), "https://example.com/latest.json");
    }

    #[test]
    fn test_resource_url_stays_below_base() {
        let source = HttpSource::new("https://example.com/flightmap/").unwrap();
        for path in ["../aircraft_list_...json", "./latest.json", "T//x.json", ""] {
            assert!(
                matches!(source.resource_url(path), Err(SourceError::InvalidLocation(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_resource_url_encodes_reserved_characters() {
        let source = HttpSource::new("https://example.com/flightmap/").unwrap();
        let url = source.resource_url("T/AB#C_T.json").unwrap();
        assert_eq!(url.as_str(), "https://example.com/flightmap/T/AB%23C_T.json");
        assert!(url.fragment().is_none());

        let url = source.resource_url("T/AB?C_T.json").unwrap();
        assert_eq!(url.as_str(), "https://example.com/flightmap/T/AB%3FC_T.json");
        assert!(url.query().is_none());
    }

    /// Answer one request on a local port with `status` and `body`.
    ///
    /// Returns the base URL to point a source at and a handle yielding the
    /// request line that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
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
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            let request = String::from_utf8_lossy(&request).into_owned();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/flightmap/"), handle)
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let (base, server) = serve_once("200 OK", r#"{"TimeStamp": 1490000000}"#).await;
        let source = HttpSource::new(&base).unwrap();

        let body = source.fetch("latest.json").await.unwrap();
        assert_eq!(body, br#"{"TimeStamp": 1490000000}"#);
        assert_eq!(server.await.unwrap(), "GET /flightmap/latest.json HTTP/1.1");
    }

    #[tokio::test]
    async fn test_fetch_maps_404_to_not_found() {
        let (base, _server) = serve_once("404 Not Found", "").await;
        let source = HttpSource::new(&base).unwrap();

        let result = source.fetch("T/ABC123_T.json").await;
        assert!(matches!(result, Err(SourceError::NotFound(path)) if path == "T/ABC123_T.json"));
    }

    #[tokio::test]
    async fn test_fetch_maps_server_error_to_http_status() {
        let (base, _server) = serve_once("500 Internal Server Error", "oops").await;
        let source = HttpSource::new(&base).unwrap();

        let result = source.fetch("latest.json").await;
        assert!(matches!(
            result,
            Err(SourceError::Http { status: 500, ref url }) if url.ends_with("/flightmap/latest.json")
        ));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpSource::new(&format!("http://{addr}/")).unwrap();

        let result = source.fetch("latest.json").await;
        assert!(matches!(result, Err(SourceError::Transport { .. })));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpSource::new("not a url"),
            Err(SourceError::InvalidLocation(_))
        ));
        assert!(matches!(
            HttpSource::new("mailto:ops@example.com"),
            Err(SourceError::InvalidLocation(_))
        ));
    }
}
