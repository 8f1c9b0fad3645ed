//! Binary record framing.
//!
//! Each record is framed as:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ total_length: u32 (little-endian)            │  frame header
//! │ timestamp:    u32 (little-endian)            │
//! ├──────────────────────────────────────────────┤
//! │ field_1 bytes  NUL                           │  field blob
//! │ field_2 bytes  NUL                           │
//! │ ...                                          │
//! │ field_n bytes  NUL                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! `total_length` covers the whole frame including the header and the
//! trailing terminator. The timestamp is the permissive integer parse of the
//! first field (seconds since epoch); a field that does not parse yields
//! timestamp 0, never an error.

use crate::error::{LogError, Result};

/// Size of the per-record frame header (`total_length` + `timestamp`).
pub const RECORD_HEADER_SIZE: usize = 8;

/// The ordered field values of one decoded event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Vec<u8>>,
}

impl Record {
    /// All field values in schema order.
    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields
    }

    /// The field value at `position`, or `None` if the record has fewer
    /// fields than the schema (missing trailing fields are absent).
    pub fn field(&self, position: usize) -> Option<&[u8]> {
        self.fields.get(position).map(Vec::as_slice)
    }

    /// Rejoins the fields with `separator`, as one output line without the
    /// trailing newline.
    pub fn join(&self, separator: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.fields.iter().map(Vec::len).sum::<usize>() + self.fields.len(),
        );
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            out.extend_from_slice(field);
        }
        out
    }
}

/// An encoded record frame, ready to be written at a segment's write cursor.
#[derive(Debug, Clone)]
pub struct EncodedRecord {
    /// The complete frame bytes.
    pub bytes: Vec<u8>,
    /// Event timestamp parsed from the first field, already truncated to the
    /// wire's `u32` width so that append and replay agree.
    pub timestamp: i64,
}

/// A record decoded from a segment's data region.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    /// The decoded field values.
    pub record: Record,
    /// Event timestamp from the frame header.
    pub timestamp: i64,
    /// Total frame length in bytes; the next record starts this many bytes
    /// after this one.
    pub len: usize,
}

/// Parses a leading decimal integer: optional whitespace, optional sign,
/// digits until the first non-digit. Anything unparsable yields 0.
pub fn parse_i64(bytes: &[u8]) -> i64 {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let mut negative = false;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        negative = bytes[i] == b'-';
        i += 1;
    }
    let mut value: i64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value.wrapping_mul(10).wrapping_add((bytes[i] - b'0') as i64);
        i += 1;
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Splits a raw line into field values on `separator`.
///
/// An empty line is one empty field; the field count may differ from the
/// schema's.
pub fn split_line(line: &[u8], separator: u8) -> Vec<&[u8]> {
    line.split(move |b| *b == separator).collect()
}

/// Encodes one record from its ordered field values.
pub fn encode(fields: &[&[u8]]) -> EncodedRecord {
    let blob_len: usize = fields.iter().map(|f| f.len() + 1).sum();
    let total = RECORD_HEADER_SIZE + blob_len;
    let wire_ts = fields.first().map_or(0, |f| parse_i64(f)) as u32;

    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&(total as u32).to_le_bytes());
    bytes.extend_from_slice(&wire_ts.to_le_bytes());
    for field in fields {
        bytes.extend_from_slice(field);
        bytes.push(0);
    }

    EncodedRecord {
        bytes,
        timestamp: wire_ts as i64,
    }
}

/// Decodes the record frame at `offset` within `data`, which must not be
/// read past `limit` (the owning segment's write cursor).
pub fn decode(data: &[u8], offset: usize, limit: usize) -> Result<DecodedRecord> {
    let corrupt = |reason| LogError::CorruptRecord {
        offset: offset as u64,
        reason,
    };

    if offset + RECORD_HEADER_SIZE > limit || limit > data.len() {
        return Err(corrupt("frame header past write cursor"));
    }
    let total = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
    if total < RECORD_HEADER_SIZE + 1 {
        return Err(corrupt("frame length shorter than header"));
    }
    if offset + total > limit {
        return Err(corrupt("frame body past write cursor"));
    }
    let timestamp =
        u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap()) as i64;

    let blob = &data[offset + RECORD_HEADER_SIZE..offset + total];
    let mut fields = Vec::new();
    let mut start = 0;
    for (i, b) in blob.iter().enumerate() {
        if *b == 0 {
            fields.push(blob[start..i].to_vec());
            start = i + 1;
        }
    }
    if start < blob.len() {
        // Unterminated tail; a well-formed encoder never produces this.
        fields.push(blob[start..].to_vec());
    }

    Ok(DecodedRecord {
        record: Record { fields },
        timestamp,
        len: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_of(line: &[u8]) -> Vec<&[u8]> {
        split_line(line, b'\t')
    }

    #[test]
    fn test_roundtrip() {
        let encoded = encode(&fields_of(b"100\talice\tlogin"));
        assert_eq!(encoded.timestamp, 100);
        assert_eq!(encoded.bytes.len(), 8 + 16);

        let decoded = decode(&encoded.bytes, 0, encoded.bytes.len()).unwrap();
        assert_eq!(decoded.timestamp, 100);
        assert_eq!(decoded.len, encoded.bytes.len());
        assert_eq!(
            decoded.record.fields(),
            &[b"100".to_vec(), b"alice".to_vec(), b"login".to_vec()]
        );
        assert_eq!(decoded.record.join(b'\t'), b"100\talice\tlogin".to_vec());
    }

    #[test]
    fn test_timestamp_parse_is_permissive() {
        assert_eq!(parse_i64(b"123"), 123);
        assert_eq!(parse_i64(b"  42abc"), 42);
        assert_eq!(parse_i64(b"-7"), -7);
        assert_eq!(parse_i64(b"abc"), 0);
        assert_eq!(parse_i64(b""), 0);
        // Unparsable first field yields timestamp 0, never an error.
        let encoded = encode(&fields_of(b"notatime\tx"));
        assert_eq!(encoded.timestamp, 0);
    }

    #[test]
    fn test_empty_line_is_one_empty_field() {
        let encoded = encode(&fields_of(b""));
        let decoded = decode(&encoded.bytes, 0, encoded.bytes.len()).unwrap();
        assert_eq!(decoded.record.fields(), &[Vec::<u8>::new()]);
    }

    #[test]
    fn test_decode_rejects_truncated_frames() {
        let encoded = encode(&fields_of(b"100\tx"));
        // Cursor before the frame end.
        assert!(decode(&encoded.bytes, 0, encoded.bytes.len() - 1).is_err());
        // Cursor inside the frame header.
        assert!(decode(&encoded.bytes, 0, 4).is_err());
        // Zeroed length field.
        let mut zeroed = encoded.bytes.clone();
        zeroed[..4].copy_from_slice(&0u32.to_le_bytes());
        assert!(decode(&zeroed, 0, zeroed.len()).is_err());
    }

    #[test]
    fn test_consecutive_frames() {
        let mut data = Vec::new();
        let first = encode(&fields_of(b"100\ta"));
        let second = encode(&fields_of(b"200\tbb"));
        data.extend_from_slice(&first.bytes);
        data.extend_from_slice(&second.bytes);

        let d1 = decode(&data, 0, data.len()).unwrap();
        let d2 = decode(&data, d1.len, data.len()).unwrap();
        assert_eq!(d1.timestamp, 100);
        assert_eq!(d2.timestamp, 200);
        assert_eq!(d2.record.field(1), Some(b"bb".as_slice()));
    }
}
