use chrono::SecondsFormat;
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use rayon::prelude::*;
use serde_json::json;

use super::feature::{AnalysisFeature, DEFAULT_BOUNDARY_HALF_WIDTH};
use crate::crs::crs_utils::CRS84_URN;

/// Project features onto a GeoJSON `FeatureCollection` named `name`.
///
/// Every feature becomes a Point. With `include_polygons`, every feature additionally gets a
/// square boundary Polygon with the id suffix `_boundary`, marking the area of interest around
/// the point.
pub fn to_feature_collection(
    features: &[AnalysisFeature],
    name: &str,
    include_polygons: bool,
) -> FeatureCollection {
    to_feature_collection_with_half_width(
        features,
        name,
        include_polygons,
        DEFAULT_BOUNDARY_HALF_WIDTH,
    )
}

pub fn to_feature_collection_with_half_width(
    features: &[AnalysisFeature],
    name: &str,
    include_polygons: bool,
    boundary_half_width: f64,
) -> FeatureCollection {
    let geojson_features: Vec<Feature> = features
        .par_iter()
        .flat_map_iter(|feature| {
            let mut projected = vec![point_feature(feature)];
            if include_polygons {
                projected.push(boundary_feature(feature, boundary_half_width));
            }
            projected
        })
        .collect();

    let mut foreign_members = JsonObject::new();
    foreign_members.insert("name".to_string(), JsonValue::from(name));
    foreign_members.insert(
        "crs".to_string(),
        json!({"type": "name", "properties": {"name": CRS84_URN}}),
    );

    FeatureCollection {
        bbox: None,
        features: geojson_features,
        foreign_members: Some(foreign_members),
    }
}

/// Serialized GeoJSON document, see [`to_feature_collection`].
pub fn to_geojson_string(
    features: &[AnalysisFeature],
    name: &str,
    include_polygons: bool,
    boundary_half_width: f64,
) -> String {
    let feature_collection = to_feature_collection_with_half_width(
        features,
        name,
        include_polygons,
        boundary_half_width,
    );
    GeoJson::from(feature_collection).to_string()
}

fn point_feature(feature: &AnalysisFeature) -> Feature {
    let coordinates = &feature.coordinates;
    let geometry = Geometry::new(geojson::Value::Point(vec![
        coordinates.lng(),
        coordinates.lat(),
    ]));

    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), JsonValue::from(feature.id.as_str()));
    properties.insert("name".to_string(), JsonValue::from(feature.name.as_str()));
    properties.insert(
        "event_type".to_string(),
        JsonValue::from(feature.event_type.as_str()),
    );
    properties.insert(
        "change_percent".to_string(),
        JsonValue::from(feature.change_percent.unwrap_or(0.0)),
    );
    properties.insert(
        "start_date".to_string(),
        JsonValue::from(feature.start_date.to_string()),
    );
    properties.insert(
        "end_date".to_string(),
        JsonValue::from(feature.end_date.to_string()),
    );
    properties.insert(
        "summary".to_string(),
        JsonValue::from(feature.summary.as_deref().unwrap_or("")),
    );
    properties.insert(
        "area_analyzed".to_string(),
        JsonValue::from(feature.area_analyzed.as_deref().unwrap_or("")),
    );
    properties.insert(
        "created_at".to_string(),
        JsonValue::from(
            feature
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    );
    properties.insert("geometry_type".to_string(), JsonValue::from("point"));

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: Some(Id::String(feature.id.clone())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn boundary_feature(feature: &AnalysisFeature, half_width: f64) -> Feature {
    let ring: Vec<geojson::Position> = feature
        .coordinates
        .boundary_ring(half_width)
        .into_iter()
        .map(|position| position.to_vec())
        .collect();
    let geometry = Geometry::new(geojson::Value::Polygon(vec![ring]));
    let id = format!("{}_boundary", feature.id);

    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), JsonValue::from(id.as_str()));
    properties.insert("name".to_string(), JsonValue::from(feature.name.as_str()));
    properties.insert(
        "event_type".to_string(),
        JsonValue::from(feature.event_type.as_str()),
    );
    properties.insert(
        "change_percent".to_string(),
        JsonValue::from(feature.change_percent.unwrap_or(0.0)),
    );
    properties.insert("geometry_type".to_string(), JsonValue::from("boundary"));

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: Some(Id::String(id)),
        properties: Some(properties),
        foreign_members: None,
    }
}
