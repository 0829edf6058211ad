use std::{
    fmt,
    io::{self, Cursor, Read},
    iter::FusedIterator,
};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use geo::Winding;

use super::{dbf::DbfReader, feature::FeatureMap};
use crate::error::DecodeError;

pub const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;
const POINT_LEN: usize = 16;

/// Shape type codes of the ESRI Shapefile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
    Unknown(i32),
}

impl ShapeType {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            other => ShapeType::Unknown(other),
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeType::Unknown(code) => write!(f, "Unknown({})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Geometries the pipeline can reduce to an anchor coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(geo::Point),
    LineString(geo::LineString),
    MultiLineString(geo::MultiLineString),
    Polygon(geo::Polygon),
    MultiPolygon(geo::MultiPolygon),
}

/// One decoded shape record paired with its attribute row.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    /// Zero-based position of the record in the file, counting skipped records.
    pub index: usize,
    pub record_number: i32,
    pub shape: Shape,
    pub attributes: FeatureMap,
}

/// A record whose geometry kind the pipeline does not handle.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedShape {
    pub index: usize,
    pub record_number: i32,
    pub shape_type: ShapeType,
}

/// Pull-based decoder over an in-memory `.shp` buffer and its optional `.dbf` table.
///
/// Records are yielded in file order. Records with an unsupported geometry kind are not yielded
/// and are listed in [`ShapefileDecoder::skipped`] instead. A structural error is yielded once,
/// after which the decoder is exhausted. The `.shx` index is never needed.
pub struct ShapefileDecoder<'a> {
    shp: Cursor<&'a [u8]>,
    end: usize,
    dbf: Option<DbfReader<'a>>,
    header_shape_type: ShapeType,
    next_index: usize,
    skipped: Vec<SkippedShape>,
    finished: bool,
}

impl<'a> ShapefileDecoder<'a> {
    pub fn new(shp: &'a [u8], dbf: Option<&'a [u8]>) -> Result<Self, DecodeError> {
        if shp.len() < HEADER_LEN {
            return Err(DecodeError::TruncatedHeader { len: shp.len() });
        }
        let mut cursor = Cursor::new(shp);
        let header_err = |_: io::Error| DecodeError::TruncatedHeader { len: shp.len() };

        let file_code = cursor.read_i32::<BigEndian>().map_err(header_err)?;
        if file_code != FILE_CODE {
            return Err(DecodeError::InvalidFileCode(file_code));
        }
        cursor.set_position(24);
        let file_length_words = cursor.read_i32::<BigEndian>().map_err(header_err)?;
        let _version = cursor.read_i32::<LittleEndian>().map_err(header_err)?;
        let header_shape_type =
            ShapeType::from_code(cursor.read_i32::<LittleEndian>().map_err(header_err)?);

        // Trust the declared length only where it is shorter than the buffer, e.g. padding.
        let declared_len = file_length_words.max(0) as usize * 2;
        let end = if declared_len >= HEADER_LEN && declared_len < shp.len() {
            declared_len
        } else {
            shp.len()
        };
        cursor.set_position(HEADER_LEN as u64);

        let dbf = dbf.map(DbfReader::new).transpose()?;
        log::debug!(
            "Decoding {} byte shapefile of type {}{}",
            end,
            header_shape_type,
            if dbf.is_some() { " with attributes" } else { "" }
        );

        Ok(Self {
            shp: cursor,
            end,
            dbf,
            header_shape_type,
            next_index: 0,
            skipped: Vec::new(),
            finished: false,
        })
    }

    /// Shape type declared in the main file header.
    pub fn header_shape_type(&self) -> ShapeType {
        self.header_shape_type
    }

    /// Records skipped so far because of an unsupported geometry kind.
    pub fn skipped(&self) -> &[SkippedShape] {
        &self.skipped
    }

    /// Decode the next record of any kind, `None` at the end of the buffer.
    fn read_record(&mut self) -> Result<Option<(i32, ShapeType, Option<Shape>)>, DecodeError> {
        let offset = self.shp.position() as usize;
        if offset >= self.end {
            return Ok(None);
        }
        if self.end - offset < RECORD_HEADER_LEN {
            return Err(DecodeError::TruncatedRecordHeader { offset });
        }
        let record_number = self
            .shp
            .read_i32::<BigEndian>()
            .map_err(|_| DecodeError::TruncatedRecordHeader { offset })?;
        let content_words = self
            .shp
            .read_i32::<BigEndian>()
            .map_err(|_| DecodeError::TruncatedRecordHeader { offset })?;

        let content_start = offset + RECORD_HEADER_LEN;
        let available = self.end - content_start;
        let declared = content_words as i64 * 2;
        if declared < 4 || declared as usize > available {
            return Err(DecodeError::TruncatedRecord {
                record_number,
                offset,
                declared,
                available,
            });
        }
        let content_end = content_start + declared as usize;
        let buffer: &'a [u8] = *self.shp.get_ref();
        let mut content = Cursor::new(&buffer[content_start..content_end]);
        self.shp.set_position(content_end as u64);

        // Checked above, the content holds at least the shape type.
        let shape_type = ShapeType::from_code(
            content
                .read_i32::<LittleEndian>()
                .map_err(|source| DecodeError::MalformedRecord {
                    record_number,
                    shape_type: ShapeType::Null,
                    source,
                })?,
        );
        let shape = read_shape(shape_type, &mut content).map_err(|source| {
            DecodeError::MalformedRecord {
                record_number,
                shape_type,
                source,
            }
        })?;
        Ok(Some((record_number, shape_type, shape)))
    }

    fn next_attributes(&mut self) -> Result<FeatureMap, DecodeError> {
        match self.dbf.as_mut() {
            Some(dbf) => Ok(dbf.next_record()?.unwrap_or_default()),
            None => Ok(FeatureMap::new()),
        }
    }

    fn next_supported(&mut self) -> Result<Option<ShapeRecord>, DecodeError> {
        while let Some((record_number, shape_type, shape)) = self.read_record()? {
            let index = self.next_index;
            self.next_index += 1;
            let attributes = self.next_attributes()?;
            match shape {
                Some(shape) => {
                    return Ok(Some(ShapeRecord {
                        index,
                        record_number,
                        shape,
                        attributes,
                    }))
                }
                None => {
                    log::debug!(
                        "Skipping record {} with unsupported shape type {}",
                        record_number,
                        shape_type
                    );
                    self.skipped.push(SkippedShape {
                        index,
                        record_number,
                        shape_type,
                    });
                }
            }
        }
        Ok(None)
    }
}

impl<'a> Iterator for ShapefileDecoder<'a> {
    type Item = Result<ShapeRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_supported().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.finished = true;
        }
        result
    }
}

impl<'a> FusedIterator for ShapefileDecoder<'a> {}

/// Read the shape following the type code, `None` for kinds without a [`Shape`] counterpart.
fn read_shape(shape_type: ShapeType, content: &mut Cursor<&[u8]>) -> io::Result<Option<Shape>> {
    use ShapeType::*;
    let shape = match shape_type {
        Point | PointZ | PointM => {
            // Z and M values trail the x/y pair and are ignored.
            let (x, y) = read_xy(content)?;
            Some(Shape::Point(geo::Point::new(x, y)))
        }
        PolyLine | PolyLineZ | PolyLineM => {
            let mut lines: Vec<geo::LineString> = read_parts(content)?
                .into_iter()
                .map(geo::LineString::from)
                .collect();
            match lines.len() {
                1 => lines.pop().map(Shape::LineString),
                _ => Some(Shape::MultiLineString(geo::MultiLineString::new(lines))),
            }
        }
        Polygon | PolygonZ | PolygonM => {
            let rings = read_parts(content)?
                .into_iter()
                .map(geo::LineString::from)
                .collect();
            Some(group_rings(rings))
        }
        Null | MultiPoint | MultiPointZ | MultiPointM | MultiPatch | Unknown(_) => None,
    };
    Ok(shape)
}

fn read_xy(content: &mut Cursor<&[u8]>) -> io::Result<(f64, f64)> {
    let x = content.read_f64::<LittleEndian>()?;
    let y = content.read_f64::<LittleEndian>()?;
    Ok((x, y))
}

/// Read the parts/points layout shared by PolyLine and Polygon records.
fn read_parts(content: &mut Cursor<&[u8]>) -> io::Result<Vec<Vec<(f64, f64)>>> {
    // Skip the record bounding box.
    content.read_exact(&mut [0u8; 32])?;
    let num_parts = content.read_i32::<LittleEndian>()?;
    let num_points = content.read_i32::<LittleEndian>()?;
    if num_parts < 0 || num_points < 0 {
        return Err(invalid_data("negative part or point count"));
    }
    let (num_parts, num_points) = (num_parts as usize, num_points as usize);
    let remaining = content.get_ref().len() - content.position() as usize;
    if num_parts * 4 + num_points * POINT_LEN > remaining {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{} parts and {} points do not fit in {} bytes",
                num_parts, num_points, remaining
            ),
        ));
    }

    let mut starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        let start = content.read_i32::<LittleEndian>()?;
        let start = usize::try_from(start).map_err(|_| invalid_data("negative part index"))?;
        if start > num_points || starts.last().map_or(false, |previous| start < *previous) {
            return Err(invalid_data("part indices out of order"));
        }
        starts.push(start);
    }
    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        points.push(read_xy(content)?);
    }

    let parts = starts
        .iter()
        .enumerate()
        .map(|(part, start)| {
            let end = starts.get(part + 1).copied().unwrap_or(num_points);
            points[*start..end].to_vec()
        })
        .collect();
    Ok(parts)
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Group shapefile rings into polygons. Outer rings are clockwise, each counter-clockwise ring is
/// a hole of the outer ring preceding it.
fn group_rings(rings: Vec<geo::LineString>) -> Shape {
    let mut grouped: Vec<(geo::LineString, Vec<geo::LineString>)> = Vec::new();
    for ring in rings {
        match grouped.last_mut() {
            Some((_, holes)) if !ring.is_cw() => holes.push(ring),
            _ => grouped.push((ring, Vec::new())),
        }
    }
    let mut polygons: Vec<geo::Polygon> = grouped
        .into_iter()
        .map(|(exterior, holes)| geo::Polygon::new(exterior, holes))
        .collect();
    match polygons.len() {
        1 => Shape::Polygon(polygons.remove(0)),
        _ => Shape::MultiPolygon(geo::MultiPolygon::new(polygons)),
    }
}
