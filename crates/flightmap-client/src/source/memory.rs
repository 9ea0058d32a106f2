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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{DataSource, SourceError};

#[derive(Debug, Clone)]
enum Body {
    Bytes(Vec<u8>),
    Failure(String),
}

#[derive(Debug, Clone)]
struct Resource {
    body: Body,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    resources: HashMap<String, Resource>,
    requests: Vec<String>,
}

/// In-memory snapshot tree.
///
/// Resources can be made to fail or to answer after a delay, which makes it
/// possible to drive the pipeline through arbitrary completion orders. Every
/// request is recorded. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `body` at `path`, replacing any previous resource.
    pub fn insert(&self, path: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().resources.insert(
            path.into(),
            Resource {
                body: Body::Bytes(body.into()),
                delay: Duration::ZERO,
            },
        );
    }

    /// Publish a JSON document at `path`.
    pub fn insert_json(&self, path: impl Into<String>, document: &serde_json::Value) {
        self.insert(path, document.to_string());
    }

    /// Make requests for `path` fail with a transport error.
    pub fn fail(&self, path: impl Into<String>, message: impl Into<String>) {
        self.lock().resources.insert(
            path.into(),
            Resource {
                body: Body::Failure(message.into()),
                delay: Duration::ZERO,
            },
        );
    }

    /// Delay answers for an already published `path`.
    pub fn set_delay(&self, path: &str, delay: Duration) {
        if let Some(resource) = self.lock().resources.get_mut(path) {
            resource.delay = delay;
        }
    }

    /// Paths requested so far, in request order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Number of requests made for `path`.
    #[must_use]
    pub fn request_count(&self, path: &str) -> usize {
        self.lock().requests.iter().filter(|p| *p == path).count()
    }
}

impl DataSource for MemorySource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let resource = {
            let mut inner = self.lock();
            inner.requests.push(path.to_string());
            inner.resources.get(path).cloned()
        };

        let Some(resource) = resource else {
            return Err(SourceError::NotFound(path.to_string()));
        };
        if !resource.delay.is_zero() {
            tokio::time::sleep(resource.delay).await;
        }

        match resource.body {
            Body::Bytes(bytes) => Ok(bytes),
            Body::Failure(message) => Err(SourceError::Transport {
                url: format!("memory:///{path}"),
                message,
            }),
        }
    }

    fn location(&self) -> String {
        "memory:///".to_string()
    }
}
