use std::fmt;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record truncated: expected {expected} more bytes at offset {offset}")]
    Truncated { offset: usize, expected: usize },
    #[error("{0} trailing bytes after the last field")]
    TrailingBytes(usize),
}

/// A row: an ordered sequence of opaque byte fields.
///
/// Serialized as a 4-byte field count followed by a 4-byte length and the
/// bytes of each field, all big-endian.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Vec<u8>>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn from_fields(fields: Vec<Vec<u8>>) -> Self {
        Self { fields }
    }

    pub fn add_field(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.fields.push(bytes.into());
        self
    }

    pub fn add_int(&mut self, value: i32) -> &mut Self {
        self.add_field(value.to_be_bytes().to_vec())
    }

    pub fn add_long(&mut self, value: i64) -> &mut Self {
        self.add_field(value.to_be_bytes().to_vec())
    }

    pub fn add_string(&mut self, value: &str) -> &mut Self {
        self.add_field(value.as_bytes().to_vec())
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(Vec::as_slice)
    }

    /// Field decoded as a 4-byte big-endian integer
    pub fn field_as_int(&self, index: usize) -> Option<i32> {
        self.field(index)
            .filter(|bytes| bytes.len() == 4)
            .map(BigEndian::read_i32)
    }

    /// Field decoded as an 8-byte big-endian integer
    pub fn field_as_long(&self, index: usize) -> Option<i64> {
        self.field(index)
            .filter(|bytes| bytes.len() == 8)
            .map(BigEndian::read_i64)
    }

    pub fn field_as_string(&self, index: usize) -> Option<String> {
        self.field(index)
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    }

    pub fn serialized_size(&self) -> usize {
        4 + self.fields.iter().map(|f| 4 + f.len()).sum::<usize>()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.serialized_size()];
        BigEndian::write_u32(&mut buf[0..4], self.fields.len() as u32);

        let mut pos = 4;
        for field in &self.fields {
            BigEndian::write_u32(&mut buf[pos..pos + 4], field.len() as u32);
            pos += 4;
            buf[pos..pos + field.len()].copy_from_slice(field);
            pos += field.len();
        }
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut cursor = Cursor::new(bytes);

        let count = read_len(&mut cursor)?;
        let mut fields = Vec::new();
        for _ in 0..count {
            let len = read_len(&mut cursor)?;
            let offset = cursor.position() as usize;
            if len > bytes.len() - offset {
                return Err(RecordError::Truncated { offset, expected: len });
            }
            let mut field = vec![0u8; len];
            cursor
                .read_exact(&mut field)
                .map_err(|_| RecordError::Truncated { offset, expected: len })?;
            fields.push(field);
        }

        let trailing = bytes.len() - cursor.position() as usize;
        if trailing > 0 {
            return Err(RecordError::TrailingBytes(trailing));
        }

        Ok(Self { fields })
    }
}

fn read_len(cursor: &mut Cursor<&[u8]>) -> Result<usize, RecordError> {
    let offset = cursor.position() as usize;
    cursor
        .read_u32::<BigEndian>()
        .map(|len| len as usize)
        .map_err(|_| RecordError::Truncated { offset, expected: 4 })
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record{{fields={}}}", self.fields.len())
    }
}
