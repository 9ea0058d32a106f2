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

//! Application configuration management.
//!
//! Configuration is stored in TOML format via confy. Missing keys fall back to
//! their defaults, so older files keep loading as fields are added.

use std::path::PathBuf;
use std::time::Duration;

use flightmap_client::{
    ClientConfig, Color, OverlayStyle, PipelineConfig, StylePalette, DEFAULT_SOURCE,
};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "flightmap";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// URL or local directory of the published snapshot tree
    #[serde(default = "default_source")]
    pub source: String,

    /// Resource naming the newest snapshot, relative to the source
    #[serde(default = "default_latest_resource")]
    pub latest_resource: String,

    /// Name of the flight layer in the layer control
    #[serde(default = "default_layer_name")]
    pub layer_name: String,

    /// Color of flight paths before they are clicked
    #[serde(default = "default_color")]
    pub default_color: String,

    /// Color of a clicked flight path
    #[serde(default = "default_selected_color")]
    pub selected_color: String,

    /// Per-request timeout for HTTP sources
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum flight fetches in flight at once (unlimited when unset)
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,

    /// Re-render every N seconds (single run when unset)
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,

    /// Where to write the GeoJSON export (stdout when unset)
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_latest_resource() -> String {
    flightmap_client::feed::LATEST_RESOURCE.to_string()
}

fn default_layer_name() -> String {
    flightmap_client::overlay::DEFAULT_LAYER_NAME.to_string()
}

fn default_color() -> String {
    "red".to_string()
}

fn default_selected_color() -> String {
    "blue".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            source: default_source(),
            latest_resource: default_latest_resource(),
            layer_name: default_layer_name(),
            default_color: default_color(),
            selected_color: default_selected_color(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_fetches: None,
            refresh_interval_secs: None,
            output_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults if absent
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    #[must_use]
    pub fn palette(&self) -> StylePalette {
        StylePalette {
            default: OverlayStyle::with_color(Color::new(self.default_color.as_str())),
            selected: OverlayStyle::with_color(Color::new(self.selected_color.as_str())),
        }
    }

    /// Refresh period, if periodic rendering is enabled
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Client configuration for the library
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            source: self.source.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            pipeline: PipelineConfig {
                latest_resource: self.latest_resource.clone(),
                layer_name: self.layer_name.clone(),
                palette: self.palette(),
                max_concurrent_fetches: self.max_concurrent_fetches,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.source, DEFAULT_SOURCE);
        assert_eq!(config.latest_resource, "latest.json");
        assert_eq!(config.layer_name, "Flights");
        assert_eq!(config.palette(), StylePalette::default());
        assert!(config.refresh_interval().is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"source": "/opt/output-json", "max_concurrent_fetches": 8}"#)
                .unwrap();
        assert_eq!(config.source, "/opt/output-json");
        assert_eq!(config.max_concurrent_fetches, Some(8));
        assert_eq!(config.config_version, 1);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.selected_color, "blue");
    }

    #[test]
    fn test_client_config_carries_settings() {
        let config = AppConfig {
            layer_name: "Tracks".to_string(),
            default_color: "#ff0000".to_string(),
            request_timeout_secs: 5,
            refresh_interval_secs: Some(60),
            ..AppConfig::default()
        };
        let client = config.client_config();
        assert_eq!(client.request_timeout, Duration::from_secs(5));
        assert_eq!(client.pipeline.layer_name, "Tracks");
        assert_eq!(client.pipeline.palette.default.color.as_str(), "#ff0000");
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_refresh_interval_disables_refresh() {
        let config = AppConfig {
            refresh_interval_secs: Some(0),
            ..AppConfig::default()
        };
        assert!(config.refresh_interval().is_none());
    }
}
