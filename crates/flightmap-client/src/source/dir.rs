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

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::{DataSource, SourceError};

/// Snapshot tree in the publisher's local output directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SourceError::InvalidLocation(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl DataSource for DirSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let full_path = self.resolve(path)?;
        tokio::fs::read(&full_path).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                SourceError::NotFound(path.to_string())
            } else {
                SourceError::Io {
                    path: full_path,
                    source,
                }
            }
        })
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
