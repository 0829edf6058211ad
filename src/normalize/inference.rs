use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::geofile::feature::{FeatureMap, FieldValue};

pub const DEFAULT_EVENT_TYPE: &str = "environmental_change";

const EVENT_TYPE_KEYS: [&str; 8] = [
    "event_type",
    "eventType",
    "EVENT_TYPE",
    "type",
    "TYPE",
    "class",
    "CLASS",
    "category",
];

/// Keyword rules applied to the concatenated attribute values, in priority order.
const EVENT_KEYWORDS: [(&[&str], &str); 5] = [
    (&["deforest", "forest"], "deforestation"),
    (&["flood"], "flood"),
    (&["drought"], "drought"),
    (&["fire", "burn"], "wildfire"),
    (&["urban"], "urbanization"),
];

const CHANGE_PERCENT_KEYS: [&str; 7] = [
    "change_percent",
    "changePercent",
    "CHANGE_PERCENT",
    "change",
    "CHANGE",
    "percent",
    "PERCENT",
];

const START_DATE_KEYS: [&str; 7] = [
    "start_date",
    "startDate",
    "START_DATE",
    "date_start",
    "DATE_START",
    "from_date",
    "FROM_DATE",
];

const END_DATE_KEYS: [&str; 7] = [
    "end_date",
    "endDate",
    "END_DATE",
    "date_end",
    "DATE_END",
    "to_date",
    "TO_DATE",
];

const DATE_KEYS: [&str; 5] = ["date", "DATE", "Date", "acq_date", "ACQ_DATE"];

const AREA_KEYS: [&str; 7] = [
    "area_analyzed",
    "areaAnalyzed",
    "AREA_ANALYZED",
    "area",
    "AREA",
    "area_km2",
    "AREA_KM2",
];

const NAME_KEYS: [&str; 3] = ["name", "NAME", "Name"];

const SUMMARY_KEYS: [&str; 4] = ["summary", "SUMMARY", "description", "DESCRIPTION"];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Canonical fields recovered from a loosely typed attribute dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredFields {
    pub name: String,
    pub event_type: String,
    pub change_percent: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary: String,
    pub area_analyzed: Option<String>,
}

/// Map `attributes` of the record at `index` to canonical fields. Every field follows its own
/// ordered list of rules, the first rule that yields a value wins.
pub fn infer_fields(attributes: &FeatureMap, index: usize) -> InferredFields {
    InferredFields {
        name: probe(attributes, &NAME_KEYS, FieldValue::as_text)
            .unwrap_or_else(|| format!("Feature {}", index + 1)),
        event_type: infer_event_type(attributes),
        change_percent: infer_change_percent(attributes),
        start_date: infer_date(attributes, &START_DATE_KEYS),
        end_date: infer_date(attributes, &END_DATE_KEYS),
        summary: probe(attributes, &SUMMARY_KEYS, FieldValue::as_text).unwrap_or_default(),
        area_analyzed: probe(attributes, &AREA_KEYS, format_area),
    }
}

/// Try `coerce` on the values of `keys` in order and return the first success.
fn probe<T>(
    attributes: &FeatureMap,
    keys: &[&str],
    coerce: impl Fn(&FieldValue) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .filter_map(|key| attributes.get(*key))
        .find_map(coerce)
}

pub fn infer_event_type(attributes: &FeatureMap) -> String {
    if let Some(event_type) = probe(attributes, &EVENT_TYPE_KEYS, FieldValue::as_text) {
        return event_type;
    }
    let haystack = attributes
        .values()
        .filter_map(FieldValue::as_text)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    EVENT_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| haystack.contains(keyword)))
        .map(|(_, event_type)| event_type.to_string())
        .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string())
}

pub fn infer_change_percent(attributes: &FeatureMap) -> Option<f64> {
    probe(attributes, &CHANGE_PERCENT_KEYS, |value| {
        let number = value.as_number();
        if number.is_none() && !matches!(value, FieldValue::Null) {
            log::debug!("Ignoring non-numeric change percent {:?}", value);
        }
        number
    })
}

/// Probe the direction-specific `keys`, then the generic date keys.
pub fn infer_date(attributes: &FeatureMap, keys: &[&str]) -> Option<NaiveDate> {
    probe(attributes, keys, parse_calendar_date)
        .or_else(|| probe(attributes, &DATE_KEYS, parse_calendar_date))
}

/// Coerce a value to a real calendar date. Text is tried as RFC 3339, then as a few common date
/// and date-time layouts. Integers are read as `YYYYMMDD`.
pub fn parse_calendar_date(value: &FieldValue) -> Option<NaiveDate> {
    let date = match value {
        FieldValue::Date(date) => Some(*date),
        FieldValue::Text(text) => parse_date_text(text.trim()),
        FieldValue::Number(number) if number.fract() == 0.0 && *number > 0.0 => {
            NaiveDate::parse_from_str(&format!("{}", *number as i64), "%Y%m%d").ok()
        }
        _ => None,
    };
    if date.is_none() && !matches!(value, FieldValue::Null) {
        log::debug!("Ignoring value {:?} that is not a calendar date", value);
    }
    date
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.date_naive());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|date_time| date_time.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })
}

fn format_area(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Number(area) if area.is_finite() => Some(format!("{} km²", area)),
        FieldValue::Text(area) if !area.trim().is_empty() => Some(area.clone()),
        _ => None,
    }
}
