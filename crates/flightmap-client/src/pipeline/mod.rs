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

//! Snapshot-to-map pipeline.
//!
//! A run resolves the current snapshot, attaches a fresh layer to the
//! renderer, enumerates the snapshot's aircraft and then fetches every flight
//! concurrently. Fetches run as independent tasks in a [`JoinSet`]; the run
//! itself is the only consumer of their results and the only code touching
//! the renderer, so overlays are added one completion at a time in whatever
//! order the fetches finish.
//!
//! A failed flight fetch only drops that aircraft and is recorded in the
//! [`RunReport`]. Starting a new run on the same [`Pipeline`] supersedes the
//! one in flight: its outstanding fetches are aborted and its results are
//! discarded.

mod report;

pub use report::{FetchError, FetchFailure, RenderedAircraft, RunReport};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::feed::{self, AircraftRef, FeedError, FlightRecord, Snapshot, LATEST_RESOURCE};
use crate::overlay::{OverlayAggregator, Renderer, StylePalette, DEFAULT_LAYER_NAME};
use crate::source::DataSource;

/// Identifier of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to resolve snapshot from {resource}: {source}")]
    Resolution {
        resource: String,
        #[source]
        source: FeedError,
    },

    #[error("failed to enumerate aircraft for snapshot {snapshot}: {source}")]
    Enumeration {
        snapshot: Snapshot,
        #[source]
        source: FeedError,
    },

    #[error("run {0} was superseded")]
    Superseded(RunId),
}

/// Configuration for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resource naming the current snapshot.
    pub latest_resource: String,
    /// Name the flight layer is registered under.
    pub layer_name: String,
    pub palette: StylePalette,
    /// Upper bound on flight fetches in flight at once; `None` starts all
    /// fetches immediately.
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            latest_resource: LATEST_RESOURCE.to_string(),
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            palette: StylePalette::default(),
            max_concurrent_fetches: None,
        }
    }
}

/// Result of a run that reached steady state.
pub struct CompletedRun<R: Renderer> {
    pub report: RunReport,
    /// The layer this run owns.
    pub layer: OverlayAggregator<R>,
}

impl<R: Renderer> fmt::Debug for CompletedRun<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedRun")
            .field("report", &self.report)
            .field("layer", &self.layer)
            .finish()
    }
}

struct ActiveRun {
    id: RunId,
    cancel: CancellationToken,
}

/// Resolves snapshots from a [`DataSource`] and draws them on a [`Renderer`].
pub struct Pipeline<S: DataSource> {
    source: Arc<S>,
    config: PipelineConfig,
    active: Mutex<Option<ActiveRun>>,
}

impl<S: DataSource> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.location())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: DataSource> Pipeline<S> {
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self::with_shared_source(Arc::new(source), config)
    }

    pub fn with_shared_source(source: Arc<S>, config: PipelineConfig) -> Self {
        Self {
            source,
            config,
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the run in flight, if any.
    pub fn cancel(&self) {
        if let Some(run) = self.active().take() {
            info!("Cancelling run {}", run.id);
            run.cancel.cancel();
        }
    }

    fn begin_run(&self) -> (RunId, CancellationToken) {
        let id = RunId::new();
        let cancel = CancellationToken::new();
        let previous = self.active().replace(ActiveRun {
            id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            info!("Run {id} supersedes run {}", previous.id);
            previous.cancel.cancel();
        }
        (id, cancel)
    }

    fn end_run(&self, id: RunId) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|run| run.id == id) {
            *active = None;
        }
    }

    /// Run the pipeline once, drawing onto `renderer`.
    ///
    /// The flight layer is attached as soon as the snapshot is resolved. It is
    /// returned in the [`CompletedRun`] once every fetch has settled.
    pub async fn run<R: Renderer>(&self, renderer: &mut R) -> Result<CompletedRun<R>, PipelineError> {
        let (id, cancel) = self.begin_run();
        let guard = RunGuard { pipeline: self, id };
        info!("Run {id} started against {}", self.source.location());

        let result = self.execute(id, &cancel, renderer).await;
        drop(guard);

        match &result {
            Ok(run) => info!(
                "Run {id} finished: {} of {} aircraft rendered, {} failed",
                run.report.rendered.len(),
                run.report.enumerated,
                run.report.failures.len()
            ),
            Err(PipelineError::Superseded(_)) => info!("Run {id} discarded"),
            Err(e) => warn!("Run {id} failed: {e}"),
        }
        result
    }

    async fn execute<R: Renderer>(
        &self,
        id: RunId,
        cancel: &CancellationToken,
        renderer: &mut R,
    ) -> Result<CompletedRun<R>, PipelineError> {
        let started_at = Utc::now();
        let resource = self.config.latest_resource.as_str();

        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PipelineError::Superseded(id)),
            result = feed::resolve_snapshot(&*self.source, resource) => {
                result.map_err(|source| PipelineError::Resolution {
                    resource: resource.to_string(),
                    source,
                })?
            }
        };
        info!("Run {id} resolved snapshot {snapshot}");

        let mut layer = OverlayAggregator::attach(renderer, self.config.layer_name.as_str());

        let aircraft = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PipelineError::Superseded(id)),
            result = feed::enumerate_aircraft(&*self.source, &snapshot) => {
                result.map_err(|source| PipelineError::Enumeration {
                    snapshot: snapshot.clone(),
                    source,
                })?
            }
        };
        info!("Snapshot {snapshot} lists {} aircraft", aircraft.len());

        let enumerated = aircraft.len();
        let mut fetches = self.spawn_fetches(&snapshot, aircraft);
        let mut rendered = Vec::with_capacity(enumerated);
        let mut failures = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                joined = fetches.tasks.join_next_with_id() => Some(joined),
            };
            let Some(joined) = next else {
                fetches.abort_all();
                return Err(PipelineError::Superseded(id));
            };
            let Some(joined) = joined else { break };

            match joined {
                Ok((task, (aircraft, Ok(record)))) => {
                    fetches.pending.remove(&task);
                    layer.add(renderer, &record, &self.config.palette);
                    debug!("Added {} to layer '{}' ({} so far)", record.icao, layer.name(), layer.len());
                    rendered.push(RenderedAircraft::from_record(&aircraft, &record));
                }
                Ok((task, (aircraft, Err(error)))) => {
                    fetches.pending.remove(&task);
                    warn!("Skipping {}: {error}", aircraft.icao);
                    failures.push(FetchFailure {
                        icao: aircraft.icao,
                        error: FetchError::Feed(error),
                    });
                }
                Err(join_error) => {
                    let icao = fetches.pending.remove(&join_error.id()).unwrap_or_default();
                    warn!("Fetch task for {icao} ended abnormally: {join_error}");
                    failures.push(FetchFailure {
                        icao,
                        error: FetchError::Task(join_error.to_string()),
                    });
                }
            }
        }

        Ok(CompletedRun {
            report: RunReport {
                run_id: id,
                snapshot,
                layer_name: layer.name().to_string(),
                enumerated,
                rendered,
                failures,
                started_at,
                finished_at: Utc::now(),
            },
            layer,
        })
    }

    fn spawn_fetches(&self, snapshot: &Snapshot, aircraft: Vec<AircraftRef>) -> FetchSet {
        let limiter = self
            .config
            .max_concurrent_fetches
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let mut set = FetchSet {
            tasks: JoinSet::new(),
            pending: HashMap::with_capacity(aircraft.len()),
        };
        for aircraft in aircraft {
            let source = Arc::clone(&self.source);
            let snapshot = snapshot.clone();
            let limiter = limiter.clone();
            let icao = aircraft.icao.clone();

            let handle = set.tasks.spawn(async move {
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                debug!("Fetching {}", aircraft.icao);
                let result = feed::fetch_flight(&*source, &snapshot, &aircraft).await;
                (aircraft, result)
            });
            set.pending.insert(handle.id(), icao);
        }
        set
    }
}

/// Clears the active run slot when a run ends, including when its future is
/// dropped before completion.
struct RunGuard<'a, S: DataSource> {
    pipeline: &'a Pipeline<S>,
    id: RunId,
}

impl<S: DataSource> Drop for RunGuard<'_, S> {
    fn drop(&mut self) {
        self.pipeline.end_run(self.id);
    }
}

type FetchOutcome = (AircraftRef, Result<FlightRecord, FeedError>);

struct FetchSet {
    tasks: JoinSet<FetchOutcome>,
    /// Icao of every task that has not reported back yet.
    pending: HashMap<tokio::task::Id, String>,
}

impl FetchSet {
    fn abort_all(&mut self) {
        if !self.pending.is_empty() {
            debug!("Aborting {} outstanding fetches", self.pending.len());
        }
        self.tasks.abort_all();
    }
}
