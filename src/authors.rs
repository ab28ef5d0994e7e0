//! Authors dictionary packer (C10).
//!
//! ```text
//! header: magic "ZMHa", u16 version=1, u16 reserved=0, u32 count, u32 reserved=0
//! ids:    count * u16                                          [pad4]
//! offsets: (count+1) * u32
//! names:  utf-8 payload
//! ```

use std::collections::BTreeMap;

use crate::error::BuildError;
use crate::pool::build_string_pool;

pub const AUTHORS_MAGIC: &[u8; 4] = b"ZMHa";
pub const AUTHORS_VERSION: u16 = 1;

/// Pack the global authorId -> name table into a `ZMHa` v1 blob.
/// `names` is keyed by authorId and must already fit in `u16`.
pub fn pack_authors_dict_bin(names: &BTreeMap<i64, String>) -> Result<Vec<u8>, BuildError> {
    let mut ids = Vec::with_capacity(names.len());
    let mut name_list = Vec::with_capacity(names.len());
    for (&id, name) in names {
        let id16 = u16::try_from(id).map_err(|_| BuildError::AuthorIdOutOfRange {
            comic_id: -1,
            author_id: id,
        })?;
        ids.push(id16);
        name_list.push(name.clone());
    }

    let count = u32::try_from(ids.len()).map_err(|_| BuildError::FieldOverflow {
        field: "authors dict count",
        value: ids.len() as u64,
        max: u32::MAX as u64,
    })?;

    let mut out = Vec::new();
    out.extend_from_slice(AUTHORS_MAGIC);
    out.extend_from_slice(&AUTHORS_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for id in &ids {
        out.extend_from_slice(&id.to_le_bytes());
    }
    while out.len() % 4 != 0 {
        out.push(0);
    }

    let (offsets, pool) = build_string_pool(&name_list)?;
    for off in &offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&pool);

    Ok(out)
}
