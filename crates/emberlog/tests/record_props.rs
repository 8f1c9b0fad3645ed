//! Property tests for the record codec and append-path invariants.

use emberlog::record::{decode, encode, parse_i64, split_line};
use emberlog::{FieldSchema, LogStore, StoreConfig};
use proptest::prelude::*;
use tempfile::TempDir;

/// Field values: any printable bytes except NUL (the field terminator) and
/// tab (the separator).
fn field_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec((32u8..=126).prop_filter("no tab", |b| *b != b'\t'), 0..24)
}

fn fields_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(field_strategy(), 1..6)
}

proptest! {
    #[test]
    fn prop_roundtrip(fields in fields_strategy()) {
        let refs: Vec<&[u8]> = fields.iter().map(Vec::as_slice).collect();
        let encoded = encode(&refs);

        let decoded = decode(&encoded.bytes, 0, encoded.bytes.len()).unwrap();
        prop_assert_eq!(decoded.record.fields(), fields.as_slice());
        prop_assert_eq!(decoded.timestamp, encoded.timestamp);
        prop_assert_eq!(decoded.len, encoded.bytes.len());

        // The timestamp is the permissive parse of the first field.
        let expected = parse_i64(&fields[0]) as u32 as i64;
        prop_assert_eq!(encoded.timestamp, expected);
    }

    #[test]
    fn prop_join_inverts_split(fields in fields_strategy()) {
        let refs: Vec<&[u8]> = fields.iter().map(Vec::as_slice).collect();
        let encoded = encode(&refs);
        let decoded = decode(&encoded.bytes, 0, encoded.bytes.len()).unwrap();

        let line = decoded.record.join(b'\t');
        let split: Vec<&[u8]> = split_line(&line, b'\t');
        prop_assert_eq!(split, refs);
    }

    #[test]
    fn prop_append_offsets_are_monotonic(lines in proptest::collection::vec(field_strategy(), 1..20)) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("db")).with_segment_capacity(64 * 1024);
        let schema = FieldSchema::new(&["ts", "payload"], &["payload"]);
        let mut store = LogStore::open(config, schema).unwrap();

        let mut last: Option<u64> = None;
        for (i, payload) in lines.iter().enumerate() {
            let mut line = format!("{}\t", 100 + i).into_bytes();
            line.extend_from_slice(payload);
            let offset = store.append_line(&line).unwrap();
            if let Some(last) = last {
                prop_assert!(offset > last);
            }
            last = Some(offset);
        }
        prop_assert_eq!(store.stats().record_count, lines.len() as u64);
    }
}
