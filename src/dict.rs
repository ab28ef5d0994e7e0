//! Dictionary packer v3 (C9).
//!
//! ```text
//! header:   magic "ZMHd", u16 version=3, u16 n, u32 entryCount, u32 reserved=0
//! keys:     entryCount * u32                (sorted ascending, unique)
//! shardIds: entryCount * u8                                    [pad4]
//! offsets:  entryCount * u32
//! lengths:  entryCount * u16
//! docFreqs: entryCount * u16
//! ```

use crate::error::BuildError;
use crate::postings::ShardedEntry;

pub const DICT_MAGIC: &[u8; 4] = b"ZMHd";
pub const DICT_VERSION: u16 = 3;

/// Pack dictionary `entries` (already sorted by ascending key) into a
/// `ZMHd` v3 blob. `n` is the n-gram width (2 for bigrams).
pub fn pack_dict_bin_v3(n: u16, entries: &[ShardedEntry]) -> Result<Vec<u8>, BuildError> {
    let entry_count = u32::try_from(entries.len()).map_err(|_| BuildError::FieldOverflow {
        field: "dict entry count",
        value: entries.len() as u64,
        max: u32::MAX as u64,
    })?;

    let mut out = Vec::new();
    out.extend_from_slice(DICT_MAGIC);
    out.extend_from_slice(&DICT_VERSION.to_le_bytes());
    out.extend_from_slice(&n.to_le_bytes());
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for e in entries {
        out.extend_from_slice(&e.key.to_le_bytes());
    }
    for e in entries {
        out.push(e.shard_id);
    }
    while out.len() % 4 != 0 {
        out.push(0);
    }
    for e in entries {
        out.extend_from_slice(&e.offset.to_le_bytes());
    }
    for e in entries {
        out.extend_from_slice(&e.length.to_le_bytes());
    }
    for e in entries {
        out.extend_from_slice(&e.doc_freq.to_le_bytes());
    }

    Ok(out)
}
