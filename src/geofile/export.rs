use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use super::{
    feature::{AnalysisFeature, DEFAULT_BOUNDARY_HALF_WIDTH},
    geojson::to_geojson_string,
    kml::to_kml_string_with_half_width,
};
use crate::crs::crs_utils::WGS84_PRJ_WKT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ExportFormat {
    GeoJson,
    Kml,
    Prj,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::GeoJson, ExportFormat::Kml, ExportFormat::Prj];

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "application/geo+json",
            ExportFormat::Kml => "application/vnd.google-earth.kml+xml",
            ExportFormat::Prj => "text/plain",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Kml => "kml",
            ExportFormat::Prj => "prj",
        }
    }

    /// Default download file name for an export called `name`.
    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", sanitize_file_stem(name), self.extension())
    }

    /// Render the document for this format. The PRJ sidecar does not depend on the features.
    pub fn render(
        &self,
        features: &[AnalysisFeature],
        name: &str,
        options: &ExportOptions,
    ) -> io::Result<String> {
        match self {
            ExportFormat::GeoJson => Ok(to_geojson_string(
                features,
                name,
                options.include_polygons,
                options.boundary_half_width,
            )),
            ExportFormat::Kml => {
                to_kml_string_with_half_width(features, name, options.boundary_half_width)
            }
            ExportFormat::Prj => Ok(WGS84_PRJ_WKT.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_include_polygons")]
    pub include_polygons: bool,
    #[serde(default = "default_boundary_half_width")]
    pub boundary_half_width: f64,
}

fn default_include_polygons() -> bool {
    true
}

fn default_boundary_half_width() -> f64 {
    DEFAULT_BOUNDARY_HALF_WIDTH
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_polygons: default_include_polygons(),
            boundary_half_width: default_boundary_half_width(),
        }
    }
}

/// Replace characters that are unsafe in file names. Falls back to `export` for blank names.
fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "export".to_string()
    } else {
        stem
    }
}

/// Write `features` in every requested format into `output_dir`, returning the written paths.
pub fn write_features_to_geofiles(
    features: &[AnalysisFeature],
    output_dir: &Path,
    name: &str,
    formats: &[ExportFormat],
    options: &ExportOptions,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Creating output directory {:?}", output_dir))?;

    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let output_filepath = output_dir.join(format.file_name(name));
        log::info!(
            "Writing {} features as {} to {:?}",
            features.len(),
            format.mime_type(),
            output_filepath
        );
        let contents = format
            .render(features, name, options)
            .with_context(|| format!("Rendering {:?}", output_filepath))?;
        fs::write(&output_filepath, contents)
            .with_context(|| format!("Writing {:?}", output_filepath))?;
        written.push(output_filepath);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{NaiveDate, TimeZone, Utc};
    use rstest::rstest;
    use testdir::testdir;

    use super::{write_features_to_geofiles, ExportFormat, ExportOptions};
    use crate::{
        crs::crs_utils::WGS84_PRJ_WKT,
        geofile::feature::{AnalysisFeature, Coordinates},
    };

    #[rstest]
    #[case(ExportFormat::GeoJson, "Amazon 2024", "Amazon_2024.geojson", "application/geo+json")]
    #[case(ExportFormat::Kml, "basin/a", "basin_a.kml", "application/vnd.google-earth.kml+xml")]
    #[case(ExportFormat::Prj, "  ", "export.prj", "text/plain")]
    fn test_file_names_and_mime_types(
        #[case] format: ExportFormat,
        #[case] name: &str,
        #[case] expected_file_name: &str,
        #[case] expected_mime_type: &str,
    ) {
        assert_eq!(expected_file_name, format.file_name(name));
        assert_eq!(expected_mime_type, format.mime_type());
    }

    #[test]
    fn test_write_all_formats() {
        let features = vec![AnalysisFeature {
            id: "x".to_string(),
            name: "Lake Poopó".to_string(),
            coordinates: Coordinates::new(-18.75, -67.1).unwrap(),
            event_type: "drought".to_string(),
            change_percent: Some(-92.0),
            start_date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
            summary: None,
            area_analyzed: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }];
        let output_dir = testdir!().join("exports");

        let written = write_features_to_geofiles(
            &features,
            &output_dir,
            "poopo",
            &ExportFormat::ALL,
            &ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(3, written.len());
        let geojson = fs::read_to_string(output_dir.join("poopo.geojson")).unwrap();
        assert!(geojson.contains("\"x_boundary\""));
        let kml = fs::read_to_string(output_dir.join("poopo.kml")).unwrap();
        assert!(kml.contains("<color>ff0000ff</color>"));
        assert_eq!(WGS84_PRJ_WKT, fs::read_to_string(output_dir.join("poopo.prj")).unwrap());
    }

    #[test]
    fn test_options_without_polygons() {
        let options = ExportOptions {
            include_polygons: false,
            ..ExportOptions::default()
        };
        let geojson = ExportFormat::GeoJson.render(&[], "empty", &options).unwrap();
        assert!(geojson.contains("\"features\":[]"));
    }
}
