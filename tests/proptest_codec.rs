//! Property-based tests for the variable-length integer and code point codecs.

use proptest::prelude::*;
use statedict::codec::{
    decode_code_points, encode_code_points, read_signed, read_unsigned, signed_len, unsigned_len,
    write_signed, write_unsigned, ByteEncoding, MAX_ENCODED_LEN,
};

fn encoding_strategy() -> impl Strategy<Value = ByteEncoding> {
    prop_oneof![
        Just(ByteEncoding::Utf8),
        Just(ByteEncoding::Compact),
        Just(ByteEncoding::CompactDelta),
    ]
}

proptest! {
    #[test]
    fn prop_unsigned_roundtrip(
        value in any::<u64>(),
        tail in prop::collection::vec(any::<u8>(), 0..4),
    ) {
        let mut bytes = Vec::new();
        write_unsigned(value, &mut bytes);
        prop_assert_eq!(bytes.len(), unsigned_len(value));
        prop_assert!(bytes.len() <= MAX_ENCODED_LEN);

        // Trailing bytes are left for the caller.
        let used = bytes.len();
        bytes.extend_from_slice(&tail);
        prop_assert_eq!(read_unsigned(&bytes).unwrap(), (value, used));
    }

    #[test]
    fn prop_signed_roundtrip(value in any::<i64>()) {
        let mut bytes = Vec::new();
        write_signed(value, &mut bytes);
        prop_assert_eq!(bytes.len(), signed_len(value));
        prop_assert!(bytes.len() <= MAX_ENCODED_LEN);
        prop_assert_eq!(read_signed(&bytes).unwrap(), (value, bytes.len()));
    }

    #[test]
    fn prop_compactness_is_monotonic(a in any::<i64>(), b in any::<i64>()) {
        let (small, large) = if a.unsigned_abs() <= b.unsigned_abs() { (a, b) } else { (b, a) };
        if small.unsigned_abs() < large.unsigned_abs() {
            prop_assert!(signed_len(small) <= signed_len(large));
        }
        let (small, large) = (small.unsigned_abs(), large.unsigned_abs());
        prop_assert!(unsigned_len(small) <= unsigned_len(large));
    }

    #[test]
    fn prop_truncated_input_is_rejected(value in any::<u64>()) {
        let mut bytes = Vec::new();
        write_unsigned(value, &mut bytes);
        bytes.pop();
        prop_assert!(read_unsigned(&bytes).is_err());
    }

    #[test]
    fn prop_code_points_roundtrip(text in any::<String>(), delta in any::<bool>()) {
        let code_points: Vec<u32> = text.chars().map(u32::from).collect();
        let bytes = encode_code_points(&code_points, delta);
        prop_assert_eq!(decode_code_points(&bytes, delta).unwrap(), code_points);
    }

    #[test]
    fn prop_encodings_split_per_character(
        text in any::<String>(),
        encoding in encoding_strategy(),
    ) {
        let bytes = encoding.encode_str(&text);
        prop_assert_eq!(encoding.decode_str(&bytes).unwrap(), text.clone());

        let mut encoder = encoding.encoder();
        let mut pos = 0;
        for ch in text.chars() {
            let mut chunk = Vec::new();
            let written = encoder.push_char(ch, &mut chunk);
            prop_assert!(written <= encoding.max_bytes_per_char());
            prop_assert_eq!(encoding.char_len(&bytes[pos..]).unwrap(), written);
            prop_assert_eq!(&bytes[pos..pos + written], &chunk[..]);
            pos += written;
        }
        prop_assert_eq!(pos, bytes.len());
    }
}
