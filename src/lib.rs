//! GIS interchange for environmental-change analyses: shapefile decoding, attribute
//! normalization into canonical features, and GeoJSON/KML export.
extern crate log;
pub mod crs;
pub mod error;
pub mod geofile;
pub mod normalize;
