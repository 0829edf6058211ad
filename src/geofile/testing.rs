//! Builders for in-memory shapefile and dBASE fixtures used by the unit tests.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub(crate) enum TestShape {
    Null,
    Point(f64, f64),
    PolyLine(Vec<Vec<(f64, f64)>>),
    Polygon(Vec<Vec<(f64, f64)>>),
    MultiPoint(Vec<(f64, f64)>),
}

impl TestShape {
    fn type_code(&self) -> i32 {
        match self {
            TestShape::Null => 0,
            TestShape::Point(..) => 1,
            TestShape::PolyLine(_) => 3,
            TestShape::Polygon(_) => 5,
            TestShape::MultiPoint(_) => 8,
        }
    }

    fn content(&self) -> Vec<u8> {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(self.type_code()).unwrap();
        match self {
            TestShape::Null => {}
            TestShape::Point(x, y) => {
                content.write_f64::<LittleEndian>(*x).unwrap();
                content.write_f64::<LittleEndian>(*y).unwrap();
            }
            TestShape::PolyLine(parts) | TestShape::Polygon(parts) => {
                write_bbox(&mut content);
                let num_points: usize = parts.iter().map(|part| part.len()).sum();
                content.write_i32::<LittleEndian>(parts.len() as i32).unwrap();
                content.write_i32::<LittleEndian>(num_points as i32).unwrap();
                let mut start = 0;
                for part in parts {
                    content.write_i32::<LittleEndian>(start as i32).unwrap();
                    start += part.len();
                }
                for (x, y) in parts.iter().flatten() {
                    content.write_f64::<LittleEndian>(*x).unwrap();
                    content.write_f64::<LittleEndian>(*y).unwrap();
                }
            }
            TestShape::MultiPoint(points) => {
                write_bbox(&mut content);
                content.write_i32::<LittleEndian>(points.len() as i32).unwrap();
                for (x, y) in points {
                    content.write_f64::<LittleEndian>(*x).unwrap();
                    content.write_f64::<LittleEndian>(*y).unwrap();
                }
            }
        }
        content
    }
}

fn write_bbox(content: &mut Vec<u8>) {
    for _ in 0..4 {
        content.write_f64::<LittleEndian>(0.0).unwrap();
    }
}

/// Serialize shapes into a `.shp` buffer, records numbered from 1.
pub(crate) fn build_shp(shapes: &[TestShape]) -> Vec<u8> {
    let mut records = Vec::new();
    for (index, shape) in shapes.iter().enumerate() {
        let content = shape.content();
        records.write_i32::<BigEndian>(index as i32 + 1).unwrap();
        records.write_i32::<BigEndian>(content.len() as i32 / 2).unwrap();
        records.extend(content);
    }

    let mut shp = Vec::with_capacity(100 + records.len());
    shp.write_i32::<BigEndian>(9994).unwrap();
    for _ in 0..5 {
        shp.write_i32::<BigEndian>(0).unwrap();
    }
    shp.write_i32::<BigEndian>((100 + records.len()) as i32 / 2).unwrap();
    shp.write_i32::<LittleEndian>(1000).unwrap();
    let header_type = shapes.first().map(TestShape::type_code).unwrap_or(0);
    shp.write_i32::<LittleEndian>(header_type).unwrap();
    for _ in 0..8 {
        shp.write_f64::<LittleEndian>(0.0).unwrap();
    }
    shp.extend(records);
    shp
}

/// Serialize a dBASE III table. Fields are `(name, type, length, decimal count)`, each row holds
/// one cell per field.
pub(crate) fn build_dbf(fields: &[(&str, char, u8, u8)], rows: &[Vec<&str>]) -> Vec<u8> {
    let header_len = 32 + 32 * fields.len() + 1;
    let record_len = 1 + fields.iter().map(|field| field.2 as usize).sum::<usize>();

    let mut dbf = Vec::new();
    dbf.write_u8(0x03).unwrap();
    dbf.extend([124u8, 1, 1]);
    dbf.write_u32::<LittleEndian>(rows.len() as u32).unwrap();
    dbf.write_u16::<LittleEndian>(header_len as u16).unwrap();
    dbf.write_u16::<LittleEndian>(record_len as u16).unwrap();
    dbf.extend([0u8; 20]);

    for (name, field_type, length, decimal_count) in fields {
        let mut name_bytes = [0u8; 11];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        dbf.extend(name_bytes);
        dbf.write_u8(*field_type as u8).unwrap();
        dbf.extend([0u8; 4]);
        dbf.write_u8(*length).unwrap();
        dbf.write_u8(*decimal_count).unwrap();
        dbf.extend([0u8; 14]);
    }
    dbf.write_u8(0x0d).unwrap();

    for row in rows {
        dbf.write_u8(b' ').unwrap();
        for ((_, _, length, _), cell) in fields.iter().zip(row) {
            dbf.extend(format!("{:<width$}", cell, width = *length as usize).into_bytes());
        }
    }
    dbf.write_u8(0x1a).unwrap();
    dbf
}
