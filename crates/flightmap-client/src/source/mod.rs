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

//! Read-only access to a published snapshot tree.
//!
//! A [`DataSource`] resolves relative resource paths such as
//! `1490000000/aircraft_list_1490000000.json` to raw bytes. The tree can be
//! served over HTTP ([`HttpSource`]), read from the publisher's local output
//! directory ([`DirSource`]), or held in memory ([`MemorySource`]).

mod dir;
mod http;
mod memory;

pub use dir::DirSource;
pub use http::HttpSource;
pub use memory::MemorySource;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while reading a resource.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("request for {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid source location: {0}")]
    InvalidLocation(String),
}

/// A read-only store of published documents addressed by relative path.
pub trait DataSource: Send + Sync + 'static {
    /// Fetch the resource at `path` relative to the source root.
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;

    /// Human-readable location of the source, for logging.
    fn location(&self) -> String;
}

/// A source picked at runtime from a location string.
///
/// `http://` and `https://` locations are fetched over the network; anything
/// else is treated as a local directory.
#[derive(Debug, Clone)]
pub enum FeedSource {
    Http(HttpSource),
    Dir(DirSource),
}

impl FeedSource {
    /// Open the source named by `location`.
    pub fn open(location: &str, timeout: Duration) -> Result<Self, SourceError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            HttpSource::with_timeout(location, timeout).map(Self::Http)
        } else if location.is_empty() {
            Err(SourceError::InvalidLocation("empty location".to_string()))
        } else {
            Ok(Self::Dir(DirSource::new(location)))
        }
    }
}

impl DataSource for FeedSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        match self {
            Self::Http(source) => source.fetch(path).await,
            Self::Dir(source) => source.fetch(path).await,
        }
    }

    fn location(&self) -> String {
        match self {
            Self::Http(source) => source.location(),
            Self::Dir(source) => source.location(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_picks_source_by_scheme() {
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            FeedSource::open("https://example.com/flights/", timeout),
            Ok(FeedSource::Http(_))
        ));
        assert!(matches!(
            FeedSource::open("/opt/output-json", timeout),
            Ok(FeedSource::Dir(_))
        ));
        assert!(matches!(
            FeedSource::open("", timeout),
            Err(SourceError::InvalidLocation(_))
        ));
    }
}
