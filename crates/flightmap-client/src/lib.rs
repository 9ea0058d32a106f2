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

//! Flight map client library.
//!
//! Fetches the newest published snapshot of tracked flights and draws every
//! flight path as a clickable overlay in one named map layer. The library is
//! split into layers that can be used on their own:
//!
//! - **Protocol layer**: decoding of `latest.json`, aircraft lists and
//!   GeoJSON flight documents
//! - **Source layer**: HTTP, local directory and in-memory snapshot trees
//! - **Feed layer**: snapshot resolution, aircraft enumeration, flight fetch
//! - **Overlay layer**: the [`Renderer`] abstraction, overlay styling and the
//!   per-layer [`OverlayAggregator`]
//! - **Pipeline**: concurrent fan-out with incremental aggregation
//!
//! # Quick Start
//!
//! Use the [`Client`] type to render the current snapshot into a
//! [`SceneRenderer`]:
//!
//! ```no_run
//! use flightmap_client::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig {
//!         source: "https://example.com/output-json/".to_string(),
//!         ..Default::default()
//!     })?;
//!
//!     let rendered = client.render().await?;
//!     for aircraft in &rendered.run.report.rendered {
//!         println!("{}: {:?}", aircraft.icao, aircraft.status);
//!     }
//!     println!("{}", rendered.scene.to_geojson());
//!     Ok(())
//! }
//! ```
//!
//! # Custom Renderers
//!
//! Any map backend can be driven by implementing [`Renderer`] and calling
//! [`Pipeline::run`]:
//!
//! ```
//! use flightmap_client::{MemorySource, Pipeline, PipelineConfig, SceneRenderer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = MemorySource::new();
//! source.insert("latest.json", r#"{"TimeStamp": "T"}"#);
//! source.insert("T/aircraft_list_T.json", r#"{"Aircraft": []}"#);
//!
//! let pipeline = Pipeline::new(source, PipelineConfig::default());
//! let mut scene = SceneRenderer::new();
//! let run = pipeline.run(&mut scene).await.unwrap();
//! assert!(run.layer.is_empty());
//! assert_eq!(scene.layers().len(), 1);
//! # }
//! ```

pub mod feed;
pub mod overlay;
pub mod pipeline;
pub mod protocol;
pub mod scene;
pub mod source;

use std::time::Duration;

pub use feed::{AircraftRef, FeedError, FlightRecord, Snapshot};
pub use overlay::{
    build_overlay, ClickHandler, Color, OverlayAggregator, OverlayStyle, Renderer, StylePalette,
};
pub use pipeline::{
    CompletedRun, FetchError, FetchFailure, Pipeline, PipelineConfig, PipelineError,
    RenderedAircraft, RunId, RunReport,
};
pub use protocol::{FlightStatus, Geometry, ParseError};
pub use scene::SceneRenderer;
pub use source::{DataSource, DirSource, FeedSource, HttpSource, MemorySource, SourceError};

/// Publisher bucket the maps read from by default.
pub const DEFAULT_SOURCE: &str = "https://nstarpost-flightmap-east2.s3.amazonaws.com/";

/// Configuration for the full-stack client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL or directory of the published snapshot tree.
    pub source: String,
    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
    pub pipeline: PipelineConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            request_timeout: Duration::from_secs(30),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// A completed run together with the scene it was drawn on.
#[derive(Debug)]
pub struct RenderedScene {
    pub scene: SceneRenderer,
    pub run: CompletedRun<SceneRenderer>,
}

/// Full-stack client that renders snapshots from a configured source.
pub struct Client {
    pipeline: Pipeline<FeedSource>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Client {
    /// Open the configured source.
    pub fn new(config: ClientConfig) -> Result<Self, SourceError> {
        let source = FeedSource::open(&config.source, config.request_timeout)?;
        Ok(Self {
            pipeline: Pipeline::new(source, config.pipeline),
        })
    }

    /// Render the current snapshot into a fresh scene.
    ///
    /// Calling this while an earlier render is still running supersedes it.
    pub async fn render(&self) -> Result<RenderedScene, PipelineError> {
        let mut scene = SceneRenderer::new();
        let run = self.pipeline.run(&mut scene).await?;
        Ok(RenderedScene { scene, run })
    }

    /// Cancel the render in flight, if any.
    pub fn cancel(&self) {
        self.pipeline.cancel();
    }

    /// Location of the snapshot tree.
    #[must_use]
    pub fn location(&self) -> String {
        self.pipeline.source().location()
    }
}
