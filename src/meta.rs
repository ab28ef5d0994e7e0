//! Meta packer v4 (C7).
//!
//! Binary layout, all integers little-endian, each variable-length section
//! padded to a 4-byte boundary:
//!
//! ```text
//! header:        magic "ZMHm", u16 version=4, u16 sep, u32 count, u32 coverBaseCount
//! comicIds:      delta-varint stream, predecessor 0                    [pad4]
//! tagMaskLo:     count * u32
//! tagMaskHi:     count * u16
//! flags:         count * u8                                            [pad4]
//! titles:        (count+1) * u32 offsets, utf-8 payload                [pad4]
//! coverBases:    (coverBaseCount+1) * u32 offsets, utf-8 payload        [pad4]
//! coverBaseIdx:  count * (u8 if coverBaseCount <= 255 else u16)         [pad4]
//! coverPaths:    (count+1) * u32 offsets, utf-8 payload                [pad4]
//! authorIds:     (count+1) * u32 offsets, count * u16-list payload     [pad4]
//! aliases:       (count+1) * u32 offsets, utf-8 payload                [pad4]
//! ```

use crate::cover::{split_cover_url, CoverBaseInterner};
use crate::error::BuildError;
use crate::pool::{build_string_pool, build_u16_list_pool, pad4};
use crate::varint::encode_delta_stream;

pub const META_MAGIC: &[u8; 4] = b"ZMHm";
pub const META_VERSION: u16 = 4;
pub const LIST_SEP: char = '\u{001F}';

/// One document's worth of fields carried into a meta shard.
pub struct MetaDoc {
    pub comic_id: i64,
    pub title: String,
    pub cover_raw: String,
    pub author_ids: Vec<u16>,
    pub alias_text: String,
    pub tag_mask_lo: u32,
    pub tag_mask_hi: u16,
    pub flags: u8,
}

/// Pack one shard of documents into a `ZMHm` v4 byte blob.
pub fn pack_meta_bin(docs: &[MetaDoc]) -> Result<Vec<u8>, BuildError> {
    let count = u32::try_from(docs.len()).map_err(|_| BuildError::FieldOverflow {
        field: "meta doc count",
        value: docs.len() as u64,
        max: u32::MAX as u64,
    })?;

    let mut interner = CoverBaseInterner::new();
    let mut cover_base_ids = Vec::with_capacity(docs.len());
    let mut cover_paths = Vec::with_capacity(docs.len());
    for doc in docs {
        let (base, path) = split_cover_url(&doc.cover_raw);
        cover_base_ids.push(interner.intern(&base));
        cover_paths.push(path);
    }
    let base_count = u32::try_from(interner.len()).map_err(|_| BuildError::FieldOverflow {
        field: "cover base count",
        value: interner.len() as u64,
        max: u32::MAX as u64,
    })?;
    let idx_bytes_is_u8 = interner.len() <= 0xFF;

    let mut out = Vec::new();
    out.extend_from_slice(META_MAGIC);
    out.extend_from_slice(&META_VERSION.to_le_bytes());
    out.extend_from_slice(&(LIST_SEP as u16).to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&base_count.to_le_bytes());

    let comic_ids: Vec<i64> = docs.iter().map(|d| d.comic_id).collect();
    encode_delta_stream(&comic_ids, 0, &mut out)?;
    pad4(&mut out);

    for doc in docs {
        out.extend_from_slice(&doc.tag_mask_lo.to_le_bytes());
    }
    for doc in docs {
        out.extend_from_slice(&doc.tag_mask_hi.to_le_bytes());
    }

    for doc in docs {
        out.push(doc.flags);
    }
    pad4(&mut out);

    let titles: Vec<String> = docs.iter().map(|d| d.title.clone()).collect();
    let (title_offsets, title_pool) = build_string_pool(&titles)?;
    for off in &title_offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&title_pool);
    pad4(&mut out);

    let (base_offsets, base_pool) = build_string_pool(interner.bases())?;
    for off in &base_offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&base_pool);
    pad4(&mut out);

    if idx_bytes_is_u8 {
        for &idx in &cover_base_ids {
            out.push(idx as u8);
        }
    } else {
        for &idx in &cover_base_ids {
            out.extend_from_slice(&(idx as u16).to_le_bytes());
        }
    }
    pad4(&mut out);

    let (path_offsets, path_pool) = build_string_pool(&cover_paths)?;
    for off in &path_offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&path_pool);
    pad4(&mut out);

    let author_rows: Vec<Vec<u16>> = docs.iter().map(|d| d.author_ids.clone()).collect();
    let (author_offsets, author_pool) = build_u16_list_pool(&author_rows);
    for off in &author_offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&author_pool);
    pad4(&mut out);

    let aliases: Vec<String> = docs.iter().map(|d| d.alias_text.clone()).collect();
    let (alias_offsets, alias_pool) = build_string_pool(&aliases)?;
    for off in &alias_offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&alias_pool);
    pad4(&mut out);

    Ok(out)
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(data[at..at + 4].try_into().unwrap())
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(data[at..at + 2].try_into().unwrap())
}

/// Minimal header reader used by tests to assert the packed layout.
pub struct MetaHeader {
    pub version: u16,
    pub sep: u16,
    pub count: u32,
    pub cover_base_count: u32,
}

pub fn read_header(data: &[u8]) -> Option<MetaHeader> {
    if data.len() < 16 || &data[0..4] != META_MAGIC {
        return None;
    }
    Some(MetaHeader {
        version: read_u16(data, 4),
        sep: read_u16(data, 6),
        count: read_u32(data, 8),
        cover_base_count: read_u32(data, 12),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(comic_id: i64, title: &str, cover: &str) -> MetaDoc {
        MetaDoc {
            comic_id,
            title: title.to_string(),
            cover_raw: cover.to_string(),
            author_ids: vec![],
            alias_text: String::new(),
            tag_mask_lo: 0,
            tag_mask_hi: 0,
            flags: 0,
        }
    }

    #[test]
    fn header_round_trips() {
        let docs = vec![doc(10, "A", ""), doc(11, "B", "")];
        let bytes = pack_meta_bin(&docs).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.sep, LIST_SEP as u16);
        assert_eq!(header.count, 2);
        assert_eq!(header.cover_base_count, 1); // only the empty base
    }

    #[test]
    fn every_section_is_four_byte_aligned() {
        let docs = vec![doc(1, "x", "https://a.com/y"), doc(3, "zz", "/p")];
        let bytes = pack_meta_bin(&docs).unwrap();
        // The whole buffer is built from pad4'd sections, so its length
        // itself must be a multiple of 4.
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn distinct_cover_bases_are_counted() {
        let docs = vec![
            doc(1, "a", "https://a.com/1"),
            doc(2, "b", "https://b.com/2"),
        ];
        let bytes = pack_meta_bin(&docs).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.cover_base_count, 3); // empty + a.com + b.com
    }

    #[test]
    fn empty_shard_still_produces_a_valid_header() {
        let bytes = pack_meta_bin(&[]).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.count, 0);
        assert_eq!(header.cover_base_count, 1);
    }
}
