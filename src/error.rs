use std::{fmt, io};

use crate::geofile::shapefile::ShapeType;
use crate::normalize::normalizer::ImportReport;

/// Structural failure while decoding a shapefile or its dBASE table. Fatal for the whole decode.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("shapefile buffer holds {len} bytes, the main header alone needs 100")]
    TruncatedHeader { len: usize },

    #[error("invalid shapefile file code {0}, expected 9994")]
    InvalidFileCode(i32),

    #[error("record header at byte offset {offset} is truncated")]
    TruncatedRecordHeader { offset: usize },

    #[error(
        "record {record_number} at byte offset {offset} declares {declared} bytes of content, \
         {available} are available"
    )]
    TruncatedRecord {
        record_number: i32,
        offset: usize,
        declared: i64,
        available: usize,
    },

    #[error("record {record_number} ({shape_type}) is malformed")]
    MalformedRecord {
        record_number: i32,
        shape_type: ShapeType,
        #[source]
        source: io::Error,
    },

    #[error("invalid dBASE table: {0}")]
    InvalidDbf(String),

    #[error("dBASE record {index} is truncated")]
    TruncatedDbfRecord { index: u32 },
}

/// A reduced coordinate outside the WGS84 range, or not finite.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid coordinate lat={lat}, lng={lng}")]
pub struct InvalidCoordinate {
    pub lat: f64,
    pub lng: f64,
}

/// Why a single input record did not make it into the normalized feature list.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnsupportedGeometry(ShapeType),
    EmptyGeometry,
    InvalidCoordinate(InvalidCoordinate),
    DuplicateId(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedGeometry(shape_type) => {
                write!(f, "unsupported geometry type {}", shape_type)
            }
            SkipReason::EmptyGeometry => write!(f, "geometry has no vertices"),
            SkipReason::InvalidCoordinate(err) => write!(f, "{}", err),
            SkipReason::DuplicateId(id) => write!(f, "duplicate id '{}'", id),
        }
    }
}

/// A shapefile import aborted by a [`DecodeError`]. `partial` holds everything normalized before
/// the failure; the caller decides whether to keep it.
#[derive(Debug, thiserror::Error)]
#[error("import aborted after {} accepted features: {source}", .partial.features.len())]
pub struct ImportFailure {
    #[source]
    pub source: DecodeError,
    pub partial: ImportReport,
}
