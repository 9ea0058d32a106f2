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

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::RunId;
use crate::feed::{AircraftRef, FeedError, FlightRecord, Snapshot};
use crate::protocol::FlightStatus;

/// Why one aircraft was left off the map.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The fetch task panicked or was aborted.
    #[error("fetch task failed: {0}")]
    Task(String),
}

#[derive(Debug)]
pub struct FetchFailure {
    /// Identifier the aircraft was listed under.
    pub icao: String,
    pub error: FetchError,
}

/// Metadata of an aircraft that made it onto the map.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAircraft {
    /// Label of the overlay, taken from the flight document.
    pub icao: String,
    /// Identifier the aircraft was listed under.
    pub listed_as: String,
    pub status: Option<FlightStatus>,
    pub landed_airport: Option<String>,
    pub surveillance_score: Option<f64>,
    pub live_turns: Option<i64>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl RenderedAircraft {
    pub(crate) fn from_record(aircraft: &AircraftRef, record: &FlightRecord) -> Self {
        Self {
            icao: record.icao.clone(),
            listed_as: aircraft.icao.clone(),
            status: record.status,
            landed_airport: record.landed_airport.clone(),
            surveillance_score: record.surveillance_score,
            live_turns: record.live_turns,
            last_seen: record.last_seen,
        }
    }
}

/// Outcome of a run that settled.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub snapshot: Snapshot,
    pub layer_name: String,
    /// Number of distinct aircraft the snapshot listed.
    pub enumerated: usize,
    /// Aircraft in the order their overlays were added.
    pub rendered: Vec<RenderedAircraft>,
    pub failures: Vec<FetchFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Whether every listed aircraft was rendered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.rendered.len() == self.enumerated
    }

    #[must_use]
    pub fn rendered_icaos(&self) -> Vec<&str> {
        self.rendered.iter().map(|a| a.icao.as_str()).collect()
    }

    #[must_use]
    pub fn failed_icaos(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.icao.as_str()).collect()
    }

    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
