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

//! Snapshot resolution, aircraft enumeration and flight retrieval.
//!
//! Each published snapshot lives in a directory named after its timestamp:
//!
//! ```text
//! latest.json
//! 1490000000/aircraft_list_1490000000.json
//! 1490000000/A1B2C3_1490000000.json
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use thiserror::Error;

use crate::protocol::{self, FlightStatus, Geometry, ParseError};
use crate::source::{DataSource, SourceError};

/// Default resource naming the newest snapshot.
pub const LATEST_RESOURCE: &str = "latest.json";

/// Errors from a single feed request.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Timestamp token identifying one published batch of flights.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Publication time, when the token is a unix timestamp in seconds.
    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.0
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An aircraft listed in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftRef {
    /// ICAO 24-bit address (hex string).
    pub icao: String,
    /// Surveillance score the aircraft was listed with.
    pub surveillance_score: Option<f64>,
}

impl AircraftRef {
    pub fn new(icao: impl Into<String>) -> Self {
        Self {
            icao: icao.into(),
            surveillance_score: None,
        }
    }
}

/// Flight path and metadata for one aircraft.
#[derive(Debug, Clone)]
pub struct FlightRecord {
    /// Identity label from the flight document.
    pub icao: String,
    pub geometry: Geometry,
    pub status: Option<FlightStatus>,
    pub landed_airport: Option<String>,
    pub surveillance_score: Option<f64>,
    pub live_turns: Option<i64>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Path of the aircraft list for `snapshot`.
#[must_use]
pub fn aircraft_list_path(snapshot: &Snapshot) -> String {
    format!("{snapshot}/aircraft_list_{snapshot}.json")
}

/// Path of the flight document for `icao` in `snapshot`.
#[must_use]
pub fn flight_path(snapshot: &Snapshot, icao: &str) -> String {
    format!("{snapshot}/{icao}_{snapshot}.json")
}

/// Fetch `resource` and extract the current snapshot.
pub async fn resolve_snapshot<S: DataSource>(
    source: &S,
    resource: &str,
) -> Result<Snapshot, FeedError> {
    let bytes = source.fetch(resource).await?;
    let token = protocol::parse_latest(resource, &bytes)?;
    Ok(Snapshot(token))
}

/// Fetch the list of aircraft published in `snapshot`.
///
/// An empty list is valid. Repeated identifiers are listed once.
pub async fn enumerate_aircraft<S: DataSource>(
    source: &S,
    snapshot: &Snapshot,
) -> Result<Vec<AircraftRef>, FeedError> {
    let path = aircraft_list_path(snapshot);
    let bytes = source.fetch(&path).await?;
    let entries = protocol::parse_aircraft_list(&path, &bytes)?;

    let mut seen = HashSet::with_capacity(entries.len());
    let mut aircraft = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.icao.clone()) {
            warn!("Aircraft {} listed twice in snapshot {snapshot}", entry.icao);
            continue;
        }
        aircraft.push(AircraftRef {
            icao: entry.icao,
            surveillance_score: entry.score,
        });
    }
    Ok(aircraft)
}

/// Fetch the flight document for `aircraft` in `snapshot`.
pub async fn fetch_flight<S: DataSource>(
    source: &S,
    snapshot: &Snapshot,
    aircraft: &AircraftRef,
) -> Result<FlightRecord, FeedError> {
    let path = flight_path(snapshot, &aircraft.icao);
    let bytes = source.fetch(&path).await?;
    let document = protocol::parse_flight(&path, &bytes)?;

    let icao = document.icao.ok_or(ParseError::MissingField("Icao"))?;
    let geometry = document.geometry.ok_or(ParseError::MissingField("geometry"))?;
    geometry.validate()?;

    if icao != aircraft.icao {
        debug!("Flight {path} is labelled {icao}");
    }

    Ok(FlightRecord {
        icao,
        geometry,
        status: document.flight_status,
        landed_airport: document.landed_airport_id,
        surveillance_score: document.surveillance_score.or(aircraft.surveillance_score),
        live_turns: document.live_turns,
        last_seen: document.last_seen.and_then(unix_seconds),
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "finite unix seconds fit in i64 and the fraction is non-negative"
)]
fn unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}
