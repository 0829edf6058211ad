use std::{collections::HashMap, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    crs::crs_utils::{is_valid_wgs84, MAX_LAT, MAX_LNG, MIN_LAT, MIN_LNG},
    error::InvalidCoordinate,
};

/// Default half-width in degrees of the square area-of-interest marker drawn around a feature.
pub const DEFAULT_BOUNDARY_HALF_WIDTH: f64 = 0.15;

/// Loosely typed attribute value, as read from a dBASE table or supplied by an upstream record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    /// Non-empty textual form of the value. Null, booleans and blank strings have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            FieldValue::Number(number) if number.is_finite() => Some(number.to_string()),
            FieldValue::Date(date) => Some(date.to_string()),
            _ => None,
        }
    }

    /// Finite numeric form of the value, parsing text if necessary.
    pub fn as_number(&self) -> Option<f64> {
        let number = match self {
            FieldValue::Number(number) => *number,
            FieldValue::Text(text) => text.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        number.is_finite().then_some(number)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(value) => write!(f, "{}", value),
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Date(value) => write!(f, "{}", value),
            FieldValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

/// Attribute dictionary of a single input record.
pub type FeatureMap = HashMap<String, FieldValue>;

/// A validated WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = InvalidCoordinate;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.lat, raw.lng)
    }
}

impl TryFrom<geo::Point> for Coordinates {
    type Error = InvalidCoordinate;

    fn try_from(point: geo::Point) -> Result<Self, Self::Error> {
        Coordinates::new(point.y(), point.x())
    }
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinate> {
        if is_valid_wgs84(lat, lng) {
            Ok(Self { lat, lng })
        } else {
            Err(InvalidCoordinate { lat, lng })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Closed, counter-clockwise square ring of `[lng, lat]` positions centered on the
    /// coordinate. Five positions, the last repeating the first.
    ///
    /// This is a symbolic area-of-interest marker, the real analyzed footprint is not retained.
    /// Edges are clamped to the WGS84 range, so the square is cut short at the poles and the
    /// antimeridian instead of wrapping.
    pub fn boundary_ring(&self, half_width: f64) -> Vec<[f64; 2]> {
        let west = (self.lng - half_width).max(MIN_LNG);
        let east = (self.lng + half_width).min(MAX_LNG);
        let south = (self.lat - half_width).max(MIN_LAT);
        let north = (self.lat + half_width).min(MAX_LAT);
        vec![
            [west, south],
            [east, south],
            [east, north],
            [west, north],
            [west, south],
        ]
    }
}

/// Canonical analysis feature shared by the import and export paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFeature {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub event_type: String,
    pub change_percent: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: Option<String>,
    pub area_analyzed: Option<String>,
    pub created_at: DateTime<Utc>,
}
