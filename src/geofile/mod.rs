pub mod dbf;
pub mod export;
pub mod feature;
pub mod geojson;
pub mod kml;
pub mod shapefile;

#[cfg(test)]
pub(crate) mod testing;
