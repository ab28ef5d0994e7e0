//! String / list pool builder (C4).
//!
//! Given N items, emits an offset array of length N+1 (`uint32`) and a
//! concatenated payload, so a consumer can recover item `i` as
//! `payload[offset[i]..offset[i+1]]`.

use crate::error::BuildError;

/// Build a UTF-8 string pool: offsets are byte offsets into the payload.
pub fn build_string_pool(items: &[String]) -> Result<(Vec<u32>, Vec<u8>), BuildError> {
    let mut offsets = Vec::with_capacity(items.len() + 1);
    let mut payload = Vec::new();
    offsets.push(0u32);
    for item in items {
        payload.extend_from_slice(item.as_bytes());
        let offset = u32::try_from(payload.len()).map_err(|_| BuildError::FieldOverflow {
            field: "string pool offset",
            value: payload.len() as u64,
            max: u32::MAX as u64,
        })?;
        offsets.push(offset);
    }
    Ok((offsets, payload))
}

/// Build a `uint16`-element list pool: offsets are byte offsets (2 bytes
/// per element) into the payload.
pub fn build_u16_list_pool(rows: &[Vec<u16>]) -> (Vec<u32>, Vec<u8>) {
    let mut offsets = Vec::with_capacity(rows.len() + 1);
    let mut payload = Vec::new();
    offsets.push(0u32);
    for row in rows {
        for &v in row {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        offsets.push(payload.len() as u32);
    }
    (offsets, payload)
}

/// Pad `buf` with zero bytes until its length is a multiple of 4.
pub fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn string_pool_last_offset_equals_payload_len(items in proptest::collection::vec("[a-z]{0,10}", 0..20)) {
            let items: Vec<String> = items.into_iter().collect();
            let (offsets, payload) = build_string_pool(&items).unwrap();
            prop_assert_eq!(offsets.len(), items.len() + 1);
            prop_assert_eq!(*offsets.last().unwrap() as usize, payload.len());
            for w in offsets.windows(2) {
                prop_assert!(w[1] >= w[0]);
            }
        }

        #[test]
        fn string_pool_items_round_trip(items in proptest::collection::vec("[a-z]{0,10}", 0..20)) {
            let items: Vec<String> = items.into_iter().collect();
            let (offsets, payload) = build_string_pool(&items).unwrap();
            for (i, item) in items.iter().enumerate() {
                let slice = &payload[offsets[i] as usize..offsets[i + 1] as usize];
                prop_assert_eq!(std::str::from_utf8(slice).unwrap(), item.as_str());
            }
        }
    }
}
