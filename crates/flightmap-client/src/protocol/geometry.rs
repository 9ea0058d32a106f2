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

//! GeoJSON geometry objects as published in flight files.
//!
//! Flight paths are written as `LineString` geometries whose positions carry
//! more than the two mandatory ordinates: `[lon, lat, altitude, unix_time]`,
//! optionally followed by the bearing to the next point. Altitude can be
//! `null` for positions reported without one, so ordinates are kept as
//! `Option<f64>`.

use serde::{Deserialize, Serialize};

use super::ParseError;

/// A single GeoJSON position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(Vec<Option<f64>>);

impl Position {
    /// Create a two-dimensional position.
    #[must_use]
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self(vec![Some(longitude), Some(latitude)])
    }

    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        self.0.first().copied().flatten()
    }

    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        self.0.get(1).copied().flatten()
    }

    /// Altitude in feet, when the publisher recorded one.
    #[must_use]
    pub fn altitude(&self) -> Option<f64> {
        self.0.get(2).copied().flatten()
    }

    /// All ordinates, including the trailing time and bearing values.
    #[must_use]
    pub fn ordinates(&self) -> &[Option<f64>] {
        &self.0
    }

    fn validate(&self) -> Result<(), ParseError> {
        match (self.longitude(), self.latitude()) {
            (Some(lon), Some(lat)) if lon.abs() <= 180.0 && lat.abs() <= 90.0 => Ok(()),
            _ => Err(ParseError::InvalidValue {
                field: "coordinates",
                value: format!("{:?}", self.0),
            }),
        }
    }
}

/// Geographic extent of a geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    fn around(position: &Position) -> Option<Self> {
        let (lon, lat) = (position.longitude()?, position.latitude()?);
        Some(Self {
            min_lon: lon,
            min_lat: lat,
            max_lon: lon,
            max_lat: lat,
        })
    }

    /// Smallest bounds containing both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }
}

/// A GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Build a `LineString` from `(lon, lat)` pairs.
    #[must_use]
    pub fn line_string(points: &[(f64, f64)]) -> Self {
        Self::LineString {
            coordinates: points
                .iter()
                .map(|&(lon, lat)| Position::new(lon, lat))
                .collect(),
        }
    }

    /// GeoJSON type name of this geometry.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::MultiPoint { .. } => "MultiPoint",
            Self::LineString { .. } => "LineString",
            Self::MultiLineString { .. } => "MultiLineString",
            Self::Polygon { .. } => "Polygon",
            Self::MultiPolygon { .. } => "MultiPolygon",
            Self::GeometryCollection { .. } => "GeometryCollection",
        }
    }

    /// Visit every position in the geometry.
    pub fn for_each_position(&self, f: &mut impl FnMut(&Position)) {
        match self {
            Self::Point { coordinates } => f(coordinates),
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                coordinates.iter().for_each(f);
            }
            Self::MultiLineString { coordinates } | Self::Polygon { coordinates } => {
                coordinates.iter().flatten().for_each(f);
            }
            Self::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().for_each(f);
            }
            Self::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.for_each_position(f);
                }
            }
        }
    }

    /// Total number of positions.
    #[must_use]
    pub fn position_count(&self) -> usize {
        let mut count = 0;
        self.for_each_position(&mut |_| count += 1);
        count
    }

    /// Extent of all positions, or `None` for an empty geometry.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        self.for_each_position(&mut |position| {
            if let Some(point) = Bounds::around(position) {
                bounds = Some(bounds.map_or(point, |b| b.union(point)));
            }
        });
        bounds
    }

    /// Check that every position has an in-range longitude and latitude.
    pub fn validate(&self) -> Result<(), ParseError> {
        let mut result = Ok(());
        self.for_each_position(&mut |position| {
            if result.is_ok() {
                result = position.validate();
            }
        });
        result
    }
}
