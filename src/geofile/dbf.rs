use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDate;

use super::feature::{FeatureMap, FieldValue};
use crate::error::DecodeError;

const HEADER_LEN: usize = 32;
const FIELD_DESCRIPTOR_LEN: usize = 32;
const FIELD_TERMINATOR: u8 = 0x0d;

#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: String,
    pub field_type: char,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfHeader {
    pub last_update: Option<NaiveDate>,
    pub num_records: u32,
    pub header_len: usize,
    pub record_len: usize,
}

/// Sequential reader over a dBASE III attribute table held in memory.
pub struct DbfReader<'a> {
    buffer: &'a [u8],
    header: DbfHeader,
    fields: Vec<DbfField>,
    next_record: u32,
}

impl<'a> DbfReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Result<Self, DecodeError> {
        let header = read_header(buffer)?;
        let fields = read_field_descriptors(buffer, header.header_len)?;

        let fields_len: usize = fields.iter().map(|field| field.length).sum();
        if fields_len + 1 > header.record_len {
            return Err(DecodeError::InvalidDbf(format!(
                "fields span {} bytes but records are {} bytes long",
                fields_len + 1,
                header.record_len
            )));
        }
        log::debug!(
            "dBASE table with {} records and {} fields, last updated {:?}",
            header.num_records,
            fields.len(),
            header.last_update
        );

        Ok(Self {
            buffer,
            header,
            fields,
            next_record: 0,
        })
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    /// Read the next record, `None` once every record declared in the header has been read.
    /// Records flagged as deleted are still returned so that record `i` keeps pairing with shape
    /// `i`.
    pub fn next_record(&mut self) -> Result<Option<FeatureMap>, DecodeError> {
        if self.next_record >= self.header.num_records {
            return Ok(None);
        }
        let index = self.next_record;
        let start = self.header.header_len + index as usize * self.header.record_len;
        let end = start + self.header.record_len;
        let record = self
            .buffer
            .get(start..end)
            .ok_or(DecodeError::TruncatedDbfRecord { index })?;
        self.next_record += 1;

        // Byte 0 is the deletion flag.
        let mut offset = 1;
        let mut attributes = FeatureMap::with_capacity(self.fields.len());
        for field in &self.fields {
            let cell = &record[offset..offset + field.length];
            offset += field.length;
            attributes.insert(field.name.clone(), decode_cell(field, cell));
        }
        Ok(Some(attributes))
    }
}

fn read_header(buffer: &[u8]) -> Result<DbfHeader, DecodeError> {
    if buffer.len() < HEADER_LEN {
        return Err(DecodeError::InvalidDbf(format!(
            "{} bytes is too short for a header",
            buffer.len()
        )));
    }
    let mut cursor = Cursor::new(buffer);
    let read_err = |err: std::io::Error| DecodeError::InvalidDbf(err.to_string());

    // Skip the version byte.
    cursor.set_position(1);
    let year = 1900 + cursor.read_u8().map_err(read_err)? as i32;
    let month = cursor.read_u8().map_err(read_err)? as u32;
    let day = cursor.read_u8().map_err(read_err)? as u32;
    let num_records = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
    let header_len = cursor.read_u16::<LittleEndian>().map_err(read_err)? as usize;
    let record_len = cursor.read_u16::<LittleEndian>().map_err(read_err)? as usize;

    if header_len < HEADER_LEN + 1 || header_len > buffer.len() {
        return Err(DecodeError::InvalidDbf(format!(
            "header length {} does not fit a {} byte table",
            header_len,
            buffer.len()
        )));
    }
    if record_len == 0 {
        return Err(DecodeError::InvalidDbf("record length is zero".to_string()));
    }

    Ok(DbfHeader {
        last_update: NaiveDate::from_ymd_opt(year, month, day),
        num_records,
        header_len,
        record_len,
    })
}

fn read_field_descriptors(buffer: &[u8], header_len: usize) -> Result<Vec<DbfField>, DecodeError> {
    let mut fields = Vec::new();
    let mut offset = HEADER_LEN;
    loop {
        match buffer.get(offset) {
            Some(&FIELD_TERMINATOR) => return Ok(fields),
            Some(_) if offset + FIELD_DESCRIPTOR_LEN <= header_len => {
                let descriptor = &buffer[offset..offset + FIELD_DESCRIPTOR_LEN];
                let name = String::from_utf8_lossy(&descriptor[..11])
                    .trim_end_matches('\0')
                    .trim()
                    .to_string();
                fields.push(DbfField {
                    name,
                    field_type: char::from(descriptor[11]).to_ascii_uppercase(),
                    length: descriptor[16] as usize,
                });
                offset += FIELD_DESCRIPTOR_LEN;
            }
            _ => {
                return Err(DecodeError::InvalidDbf(
                    "field descriptor array is not terminated".to_string(),
                ))
            }
        }
    }
}

fn decode_cell(field: &DbfField, cell: &[u8]) -> FieldValue {
    let text = String::from_utf8_lossy(cell);
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        return FieldValue::Null;
    }
    match field.field_type {
        'N' | 'F' => match text.parse::<f64>() {
            Ok(number) => FieldValue::Number(number),
            Err(_) => {
                log::debug!("Field {} holds non-numeric value '{}'", field.name, text);
                FieldValue::Null
            }
        },
        'D' => match NaiveDate::parse_from_str(text, "%Y%m%d") {
            Ok(date) => FieldValue::Date(date),
            Err(_) => {
                log::debug!("Field {} holds invalid date '{}'", field.name, text);
                FieldValue::Null
            }
        },
        'L' => match text.chars().next() {
            Some('T' | 't' | 'Y' | 'y') => FieldValue::Bool(true),
            Some('F' | 'f' | 'N' | 'n') => FieldValue::Bool(false),
            _ => FieldValue::Null,
        },
        _ => FieldValue::Text(text.to_string()),
    }
}
