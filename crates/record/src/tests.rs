use super::*;
use std::io::Cursor;

// -------------------- Helpers --------------------

fn str_record(key: &str, value: &str) -> Record {
    Record::new(key, Value::Str(value.to_string()))
}

fn int_record(key: &str, value: i64) -> Record {
    Record::new(key, Value::Int64(value))
}

// -------------------- String round-trips --------------------

#[test]
fn string_encode_decode_roundtrip() {
    let rec = str_record("key", "value");
    let decoded = Record::decode(&rec.encode()).unwrap();
    assert_eq!(decoded.key, "key");
    assert_eq!(decoded.value, Value::Str("value".to_string()));
    assert_eq!(decoded, rec);
}

#[test]
fn string_read_value() {
    let rec = str_record("key", "test-value");
    let mut cursor = Cursor::new(rec.encode());
    let value = read_value(&mut cursor).unwrap();
    assert_eq!(value, Value::Str("test-value".to_string()));
}

#[test]
fn empty_string_value_roundtrip() {
    let rec = str_record("k", "");
    assert_eq!(rec.encoded_len(), 14);
    let decoded = Record::decode(&rec.encode()).unwrap();
    assert_eq!(decoded.value, Value::Str(String::new()));
}

// -------------------- Int64 round-trips --------------------

#[test]
fn int64_encode_decode_roundtrip() {
    let rec = int_record("key", 123);
    let decoded = Record::decode(&rec.encode()).unwrap();
    assert_eq!(decoded.key, "key");
    assert_eq!(decoded.value, Value::Int64(123));
}

#[test]
fn int64_negative_roundtrip() {
    let rec = int_record("key", -123);
    let decoded = Record::decode(&rec.encode()).unwrap();
    assert_eq!(decoded.value, Value::Int64(-123));

    let extremes = int_record("k", i64::MIN);
    assert_eq!(
        Record::decode(&extremes.encode()).unwrap().value,
        Value::Int64(i64::MIN)
    );
}

#[test]
fn int64_read_value() {
    let rec = int_record("key", 123);
    let mut cursor = Cursor::new(rec.encode());
    assert_eq!(read_value(&mut cursor).unwrap(), Value::Int64(123));
}

// -------------------- Sizes --------------------

#[test]
fn encoded_len_matches_layout() {
    // key(4) + value(6) + 13 bytes of framing
    assert_eq!(str_record("key1", "value1").encoded_len(), 23);
    // int64 is always key + 21
    assert_eq!(int_record("key5", 1).encoded_len(), 25);

    let rec = str_record("key1", "value1");
    assert_eq!(rec.encode().len() as u64, rec.encoded_len());
}

#[test]
fn size_field_equals_buffer_length() {
    let buf = str_record("abc", "defgh").encode();
    let declared = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    assert_eq!(declared as usize, buf.len());
}

// -------------------- read_value stream positioning --------------------

#[test]
fn read_value_leaves_stream_after_value() {
    let mut data = str_record("a", "first").encode();
    data.extend_from_slice(&int_record("bb", 42).encode());

    let mut cursor = Cursor::new(data);
    assert_eq!(
        read_value(&mut cursor).unwrap(),
        Value::Str("first".to_string())
    );
    assert_eq!(read_value(&mut cursor).unwrap(), Value::Int64(42));
}

// -------------------- Corruption --------------------

#[test]
fn decode_rejects_truncated_buffer() {
    let buf = str_record("key", "value").encode();
    let err = Record::decode(&buf[..buf.len() - 1]).unwrap_err();
    assert!(matches!(err, RecordError::Corrupt(_)));

    // Not even a full header.
    assert!(matches!(
        Record::decode(&buf[..5]).unwrap_err(),
        RecordError::Corrupt(_)
    ));
}

#[test]
fn decode_rejects_unknown_tag() {
    let mut buf = str_record("key", "value").encode();
    buf[8 + 3] = 7; // tag sits right after the 3-byte key
    assert!(matches!(
        Record::decode(&buf).unwrap_err(),
        RecordError::Corrupt(_)
    ));
}

#[test]
fn decode_rejects_impossible_size() {
    let mut buf = str_record("key", "value").encode();
    buf[0..4].copy_from_slice(&3u32.to_le_bytes());
    assert!(matches!(
        Record::decode(&buf).unwrap_err(),
        RecordError::Corrupt(_)
    ));
}

#[test]
fn decode_rejects_disagreeing_lengths() {
    let mut buf = str_record("key", "value").encode();
    // Shrink val_len without touching total_size.
    buf[9 + 3..13 + 3].copy_from_slice(&2u32.to_le_bytes());
    assert!(matches!(
        Record::decode(&buf).unwrap_err(),
        RecordError::Corrupt(_)
    ));
}

#[test]
fn decode_rejects_invalid_utf8_key() {
    let mut buf = str_record("key", "value").encode();
    buf[8] = 0xff;
    assert!(matches!(
        Record::decode(&buf).unwrap_err(),
        RecordError::Corrupt(_)
    ));
}

#[test]
fn read_value_fails_on_short_read() {
    let buf = str_record("key", "value").encode();
    let mut cursor = Cursor::new(buf[..buf.len() - 2].to_vec());
    assert!(matches!(
        read_value(&mut cursor).unwrap_err(),
        RecordError::Corrupt(_)
    ));
}
