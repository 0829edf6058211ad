use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::inference::parse_calendar_date;
use crate::geofile::feature::FieldValue;

/// Flat, already typed analysis row as stored by the dashboard database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    #[serde(default, alias = "location_name")]
    pub name: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub area_analyzed: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accept any date layout the attribute inference understands, absent otherwise.
fn lenient_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let value = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => FieldValue::Text(text),
        Some(Value::Number(number)) => {
            number.as_f64().map_or(FieldValue::Null, FieldValue::Number)
        }
        _ => FieldValue::Null,
    };
    Ok(parse_calendar_date(&value))
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let timestamp = value
        .as_str()
        .and_then(|text| DateTime::parse_from_rfc3339(text.trim()).ok())
        .map(|timestamp| timestamp.with_timezone(&Utc));
    if timestamp.is_none() {
        log::debug!("Ignoring creation time {} that is not an RFC 3339 timestamp", value);
    }
    Ok(timestamp)
}

/// Parse a JSON array of analysis rows.
pub fn records_from_json(contents: &str) -> serde_json::Result<Vec<AnalysisRecord>> {
    serde_json::from_str(contents)
}
