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

//! Wire format of the published flight snapshot tree.
//!
//! The publisher writes three kinds of JSON documents:
//!
//! - `latest.json`: `{"TimeStamp": 1490000000}` naming the newest snapshot
//! - `{ts}/aircraft_list_{ts}.json`: `{"Aircraft": [["A1B2C3", 120.0], ...]}`,
//!   a dump of the surveillance ranking as `[icao, score]` pairs
//! - `{ts}/{icao}_{ts}.json`: the flight record with `Icao`, `geometry` and
//!   tracking metadata
//!
//! This module only decodes documents; path layout lives in [`crate::feed`].

mod geometry;

pub use geometry::{Bounds, Geometry, Position};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field of `latest.json` holding the snapshot token.
pub const TIMESTAMP_FIELD: &str = "TimeStamp";

/// Field of the aircraft list holding the per-aircraft arrays.
pub const AIRCRAFT_FIELD: &str = "Aircraft";

/// Errors that can occur while decoding a published document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON in {resource}: {source}")]
    Json {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Tracking state the publisher assigns to a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightStatus {
    InFlight,
    Landed,
    OutOfRange,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct LatestDocument {
    #[serde(rename = "TimeStamp")]
    timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AircraftListDocument {
    #[serde(rename = "Aircraft")]
    aircraft: Option<Vec<Value>>,
}

/// One row of the aircraft list.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftEntry {
    pub icao: String,
    /// Surveillance score the aircraft was ranked with, when present.
    pub score: Option<f64>,
}

/// Decoded per-aircraft flight document.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightDocument {
    #[serde(rename = "Icao")]
    pub icao: Option<String>,
    pub geometry: Option<Geometry>,
    #[serde(rename = "FlightStatus", default)]
    pub flight_status: Option<FlightStatus>,
    #[serde(rename = "LandedAirportID", default)]
    pub landed_airport_id: Option<String>,
    #[serde(rename = "SurveillanceScore", default)]
    pub surveillance_score: Option<f64>,
    #[serde(rename = "LiveTurns", default)]
    pub live_turns: Option<i64>,
    /// Unix time in seconds of the last position.
    #[serde(rename = "LastSeen", default)]
    pub last_seen: Option<f64>,
}

fn decode<'a, T: Deserialize<'a>>(resource: &str, bytes: &'a [u8]) -> Result<T, ParseError> {
    serde_json::from_slice(bytes).map_err(|source| ParseError::Json {
        resource: resource.to_string(),
        source,
    })
}

/// Render a JSON scalar used as a path token (snapshot or icao).
///
/// Strings are trimmed and integers, including floats without a fractional
/// part, are printed in decimal. Anything else is rejected, as are tokens that
/// are empty, contain `/` or name a relative directory (`.`, `..`).
fn token_from_value(field: &'static str, value: &Value) -> Result<String, ParseError> {
    let token = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Number(n) => match n.as_f64().and_then(integral) {
            Some(whole) => whole.to_string(),
            None => {
                return Err(ParseError::InvalidValue {
                    field,
                    value: n.to_string(),
                })
            }
        },
        other => {
            return Err(ParseError::InvalidValue {
                field,
                value: other.to_string(),
            })
        }
    };

    if token.is_empty() || token.contains('/') || token == "." || token == ".." {
        return Err(ParseError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(token)
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "the value is integral and checked against the i64 range"
)]
fn integral(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
    (value.fract() == 0.0 && value.abs() <= LIMIT).then(|| value as i64)
}

/// Decode `latest.json` and return the snapshot token.
pub fn parse_latest(resource: &str, bytes: &[u8]) -> Result<String, ParseError> {
    let document: LatestDocument = decode(resource, bytes)?;
    let value = document
        .timestamp
        .ok_or(ParseError::MissingField(TIMESTAMP_FIELD))?;
    token_from_value(TIMESTAMP_FIELD, &value)
}

/// Decode an aircraft list.
///
/// A missing or non-array `Aircraft` field fails the whole document. Rows
/// without a usable identifier at index 0 are skipped.
pub fn parse_aircraft_list(resource: &str, bytes: &[u8]) -> Result<Vec<AircraftEntry>, ParseError> {
    let document: AircraftListDocument = decode(resource, bytes)?;
    let rows = document
        .aircraft
        .ok_or(ParseError::MissingField(AIRCRAFT_FIELD))?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(first) = row.as_array().and_then(|items| items.first()) else {
            warn!("Skipping aircraft list row without identifier in {resource}: {row}");
            continue;
        };
        match token_from_value("Aircraft[0]", first) {
            Ok(icao) => entries.push(AircraftEntry {
                icao,
                score: row.get(1).and_then(Value::as_f64),
            }),
            Err(e) => warn!("Skipping aircraft list row in {resource}: {e}"),
        }
    }
    Ok(entries)
}

/// Decode a per-aircraft flight document.
pub fn parse_flight(resource: &str, bytes: &[u8]) -> Result<FlightDocument, ParseError> {
    decode(resource, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_numeric_timestamp() {
        let token = parse_latest("latest.json", br#"{"TimeStamp": 1490000000}"#).unwrap();
        assert_eq!(token, "1490000000");
    }

    #[test]
    fn test_parse_latest_string_timestamp() {
        let token = parse_latest("latest.json", br#"{"TimeStamp": "20230101T000000"}"#).unwrap();
        assert_eq!(token, "20230101T000000");
    }

    #[test]
    fn test_parse_latest_missing_field() {
        let result = parse_latest("latest.json", br#"{"Time": 1}"#);
        assert!(matches!(result, Err(ParseError::MissingField("TimeStamp"))));
    }

    #[test]
    fn test_parse_latest_rejects_fractional_and_empty_tokens() {
        assert!(parse_latest("latest.json", br#"{"TimeStamp": 1.5}"#).is_err());
        assert!(parse_latest("latest.json", br#"{"TimeStamp": ""}"#).is_err());
        assert!(parse_latest("latest.json", br#"{"TimeStamp": "a/b"}"#).is_err());
    }

    #[test]
    fn test_parse_latest_integral_float_timestamp() {
        let token = parse_latest("latest.json", br#"{"TimeStamp": 1490000000.0}"#).unwrap();
        assert_eq!(token, "1490000000");
    }

    #[test]
    fn test_parse_latest_rejects_relative_directory_tokens() {
        for json in [&br#"{"TimeStamp": ".."}"#[..], br#"{"TimeStamp": "."}"#, br#"{"TimeStamp": " .. "}"#] {
            assert!(matches!(
                parse_latest("latest.json", json),
                Err(ParseError::InvalidValue { field: "TimeStamp", .. })
            ));
        }
    }

    #[test]
    fn test_parse_latest_malformed_json() {
        let result = parse_latest("latest.json", b"<html>");
        assert!(matches!(result, Err(ParseError::Json { resource, .. }) if resource == "latest.json"));
    }

    #[test]
    fn test_parse_aircraft_list_with_scores() {
        let json = br#"{"Aircraft": [["A1B2C3", 120.0], ["D4E5F6"]]}"#;
        let entries = parse_aircraft_list("list", json).unwrap();
        assert_eq!(
            entries,
            vec![
                AircraftEntry {
                    icao: "A1B2C3".to_string(),
                    score: Some(120.0),
                },
                AircraftEntry {
                    icao: "D4E5F6".to_string(),
                    score: None,
                },
            ]
        );
    }

    #[test]
    fn test_parse_aircraft_list_skips_unusable_rows() {
        let json = br#"{"Aircraft": [[], "A1B2C3", [null], [".."], ["D4E5F6", 3]]}"#;
        let entries = parse_aircraft_list("list", json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].icao, "D4E5F6");
    }

    #[test]
    fn test_parse_aircraft_list_empty_is_valid() {
        let entries = parse_aircraft_list("list", br#"{"Aircraft": []}"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_aircraft_list_requires_array_field() {
        assert!(matches!(
            parse_aircraft_list("list", br#"{"Planes": []}"#),
            Err(ParseError::MissingField("Aircraft"))
        ));
        assert!(matches!(
            parse_aircraft_list("list", br#"{"Aircraft": {"A1B2C3": 1}}"#),
            Err(ParseError::Json { .. })
        ));
    }

    #[test]
    fn test_parse_flight_document() {
        let json = br#"{
            "Icao": "A1B2C3",
            "Call": "N123AB",
            "FlightStatus": "Landed",
            "LandedAirportID": "KPHX",
            "SurveillanceScore": 112,
            "LiveTurns": 14,
            "LastSeen": 1490000000.25,
            "geometry": {"type": "LineString", "coordinates": [[-112.0, 33.4, 5000, 1490000000]]}
        }"#;
        let document = parse_flight("flight", json).unwrap();
        assert_eq!(document.icao.as_deref(), Some("A1B2C3"));
        assert_eq!(document.flight_status, Some(FlightStatus::Landed));
        assert_eq!(document.landed_airport_id.as_deref(), Some("KPHX"));
        assert_eq!(document.live_turns, Some(14));
        assert!(document.geometry.is_some());
    }

    #[test]
    fn test_unknown_flight_status_is_tolerated() {
        let json = br#"{"Icao": "A1B2C3", "FlightStatus": "Diverted"}"#;
        let document = parse_flight("flight", json).unwrap();
        assert_eq!(document.flight_status, Some(FlightStatus::Unknown));
        assert!(document.geometry.is_none());
    }
}
