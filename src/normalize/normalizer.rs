use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};

use super::{
    anchor::reduce_to_anchor,
    bounds::{accumulate, Bounds},
    inference::{infer_fields, DEFAULT_EVENT_TYPE},
    records::AnalysisRecord,
};
use crate::{
    error::{DecodeError, ImportFailure, SkipReason},
    geofile::{
        feature::{AnalysisFeature, Coordinates, FeatureMap},
        shapefile::{Shape, ShapeRecord, ShapefileDecoder},
    },
};

/// An input record that was not turned into a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// Zero-based position of the record in its input.
    pub index: usize,
    pub reason: SkipReason,
}

/// Outcome of normalizing a batch of input records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub features: Vec<AnalysisFeature>,
    /// Extent of the accepted features, `None` if there are none.
    pub bounds: Option<Bounds>,
    pub skipped: Vec<SkippedRecord>,
}

impl ImportReport {
    pub fn accepted_count(&self) -> usize {
        self.features.len()
    }

    fn accept(&mut self, feature: AnalysisFeature) {
        self.bounds = accumulate(self.bounds, &feature.coordinates);
        self.features.push(feature);
    }

    fn skip(&mut self, index: usize, reason: SkipReason) {
        log::warn!("Dropping record {}: {}", index, reason);
        self.skipped.push(SkippedRecord { index, reason });
    }
}

/// Turns decoded shapes and upstream records into [`AnalysisFeature`]s.
///
/// The normalizer is pinned to one timestamp, used for feature ids, `createdAt` and as the
/// fallback for missing start and end dates.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    now: DateTime<Utc>,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl FeatureNormalizer {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Normalize a single decoded shape. `index` is the record's position in the decode.
    pub fn normalize_shape(
        &self,
        index: usize,
        shape: &Shape,
        attributes: &FeatureMap,
    ) -> Result<AnalysisFeature, SkipReason> {
        let anchor = reduce_to_anchor(shape).ok_or(SkipReason::EmptyGeometry)?;
        let coordinates =
            Coordinates::try_from(anchor).map_err(SkipReason::InvalidCoordinate)?;
        let fields = infer_fields(attributes, index);

        Ok(AnalysisFeature {
            id: format!("shp-{}-{}", self.now.timestamp_millis(), index),
            name: fields.name,
            coordinates,
            event_type: fields.event_type,
            change_percent: fields.change_percent,
            start_date: fields.start_date.unwrap_or_else(|| self.today()),
            end_date: fields.end_date.unwrap_or_else(|| self.today()),
            summary: Some(fields.summary).filter(|summary| !summary.is_empty()),
            area_analyzed: fields.area_analyzed,
            created_at: self.now,
        })
    }

    /// Normalize a stream of decoded records. Records that cannot be anchored at a valid
    /// coordinate are reported as skipped and leave the bounds untouched. The first decode error
    /// aborts the import and is returned together with everything accepted up to that point.
    pub fn normalize<I>(&self, records: I) -> Result<ImportReport, ImportFailure>
    where
        I: IntoIterator<Item = Result<ShapeRecord, DecodeError>>,
    {
        let mut report = ImportReport::default();
        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(source) => {
                    return Err(ImportFailure {
                        source,
                        partial: report,
                    })
                }
            };
            match self.normalize_shape(record.index, &record.shape, &record.attributes) {
                Ok(feature) => report.accept(feature),
                Err(reason) => report.skip(record.index, reason),
            }
        }
        Ok(report)
    }

    /// Map an upstream database row onto the canonical feature, without geometry reduction.
    pub fn from_record(&self, record: AnalysisRecord) -> Result<AnalysisFeature, SkipReason> {
        let coordinates = Coordinates::new(record.latitude, record.longitude)
            .map_err(SkipReason::InvalidCoordinate)?;
        Ok(AnalysisFeature {
            name: record
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| format!("Analysis {}", record.id)),
            id: record.id,
            coordinates,
            event_type: record
                .event_type
                .filter(|event_type| !event_type.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            change_percent: record.change_percent.filter(|change| change.is_finite()),
            start_date: record.start_date.unwrap_or_else(|| self.today()),
            end_date: record.end_date.unwrap_or_else(|| self.today()),
            summary: record.summary,
            area_analyzed: record.area_analyzed,
            created_at: record.created_at.unwrap_or(self.now),
        })
    }

    /// Map a batch of upstream rows. Rows with invalid coordinates or an id already seen in the
    /// batch are skipped.
    pub fn from_records<I>(&self, records: I) -> ImportReport
    where
        I: IntoIterator<Item = AnalysisRecord>,
    {
        let mut report = ImportReport::default();
        let mut seen_ids = HashSet::new();
        for (index, record) in records.into_iter().enumerate() {
            if !seen_ids.insert(record.id.clone()) {
                report.skip(index, SkipReason::DuplicateId(record.id));
                continue;
            }
            match self.from_record(record) {
                Ok(feature) => report.accept(feature),
                Err(reason) => report.skip(index, reason),
            }
        }
        report
    }
}

/// Decode a shapefile pair and normalize every supported record.
///
/// Records with an unsupported geometry kind are listed in the report's `skipped` records next to
/// those dropped for invalid coordinates, ordered by record index.
pub fn import_shapefile(
    shp: &[u8],
    dbf: Option<&[u8]>,
    normalizer: &FeatureNormalizer,
) -> Result<ImportReport, ImportFailure> {
    let mut decoder = match ShapefileDecoder::new(shp, dbf) {
        Ok(decoder) => decoder,
        Err(source) => {
            return Err(ImportFailure {
                source,
                partial: ImportReport::default(),
            })
        }
    };
    let result = normalizer.normalize(&mut decoder);
    let unsupported = decoder.skipped().iter().map(|skipped| SkippedRecord {
        index: skipped.index,
        reason: SkipReason::UnsupportedGeometry(skipped.shape_type),
    });
    let merge = |report: &mut ImportReport| {
        report.skipped.extend(unsupported);
        report.skipped.sort_by_key(|skipped| skipped.index);
    };

    match result {
        Ok(mut report) => {
            merge(&mut report);
            log::info!(
                "Imported {} features, skipped {} records",
                report.accepted_count(),
                report.skipped.len()
            );
            Ok(report)
        }
        Err(mut failure) => {
            merge(&mut failure.partial);
            Err(failure)
        }
    }
}
