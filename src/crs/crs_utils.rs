/// OGC URN for WGS84 with longitude/latitude axis order, written into the `crs` member of
/// exported GeoJSON for QGIS and ArcGIS.
pub const CRS84_URN: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// ESRI flavoured well-known text for WGS84, the content of a `.prj` sidecar file.
pub const WGS84_PRJ_WKT: &str = concat!(
    r#"GEOGCS["GCS_WGS_1984","#,
    r#"DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],"#,
    r#"PRIMEM["Greenwich",0.0],"#,
    r#"UNIT["Degree",0.0174532925199433]]"#
);

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LNG: f64 = -180.0;
pub const MAX_LNG: f64 = 180.0;

/// Whether the pair is a finite WGS84 coordinate inside the valid latitude/longitude range.
pub fn is_valid_wgs84(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (MIN_LAT..=MAX_LAT).contains(&lat)
        && (MIN_LNG..=MAX_LNG).contains(&lng)
}
