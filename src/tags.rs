//! Tag space collector (C5).

use std::collections::HashMap;

use serde::Serialize;

use crate::error::BuildError;

pub const MAX_TAGS: usize = 50;

/// One entry in the finalized tag space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEntry {
    #[serde(rename = "tagId")]
    pub tag_id: i64,
    pub name: String,
    pub count: u64,
    pub bit: usize,
}

/// Accumulates tag occurrences across a single corpus pass.
#[derive(Default)]
pub struct TagCollector {
    names: HashMap<i64, String>,
    counts: HashMap<i64, u64>,
}

impl TagCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `tag_id` in a document, with an optional name.
    pub fn observe(&mut self, tag_id: i64, name: Option<&str>) {
        if let Some(name) = name
            && !name.is_empty()
        {
            self.names.entry(tag_id).or_insert_with(|| name.to_string());
        }
        *self.counts.entry(tag_id).or_insert(0) += 1;
    }

    /// Finalize the tag space: sort tagIds ascending, assign bits 0..K-1.
    /// Fails if more than [`MAX_TAGS`] distinct tags were observed.
    pub fn finalize(self) -> Result<TagSpace, BuildError> {
        let mut tag_ids: Vec<i64> = self.counts.keys().copied().collect();
        tag_ids.sort_unstable();

        if tag_ids.len() > MAX_TAGS {
            return Err(BuildError::TagCeilingExceeded { count: tag_ids.len() });
        }

        let mut bit_by_id = HashMap::with_capacity(tag_ids.len());
        let mut entries = Vec::with_capacity(tag_ids.len());
        for (bit, tag_id) in tag_ids.into_iter().enumerate() {
            let name = self
                .names
                .get(&tag_id)
                .cloned()
                .unwrap_or_else(|| tag_id.to_string());
            let count = self.counts[&tag_id];
            bit_by_id.insert(tag_id, bit);
            entries.push(TagEntry { tag_id, name, count, bit });
        }

        Ok(TagSpace { entries, bit_by_id })
    }
}

/// The finalized tag space: stable bit assignment plus lookup by tagId.
pub struct TagSpace {
    entries: Vec<TagEntry>,
    bit_by_id: HashMap<i64, usize>,
}

impl TagSpace {
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    pub fn bit_of(&self, tag_id: i64) -> Option<usize> {
        self.bit_by_id.get(&tag_id).copied()
    }

    /// Entries sorted for the human-readable JSON artifact: descending
    /// count, ascending name, ascending tagId.
    pub fn sorted_for_json(&self) -> Vec<&TagEntry> {
        let mut sorted: Vec<&TagEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.tag_id.cmp(&b.tag_id))
        });
        sorted
    }
}

/// Compute `(maskLo, maskHi, maskEx)` for a document given its set of tagIds.
pub fn compute_tag_mask(space: &TagSpace, tag_ids: &[i64]) -> Result<(u32, u16, u8), BuildError> {
    let mut mask_lo: u32 = 0;
    let mut mask_hi: u16 = 0;
    let mut mask_ex: u8 = 0;
    for &tag_id in tag_ids {
        let Some(bit) = space.bit_of(tag_id) else {
            continue;
        };
        if bit < 32 {
            mask_lo |= 1 << bit;
        } else if bit < 48 {
            mask_hi |= 1 << (bit - 32);
        } else if bit < 50 {
            mask_ex |= 1 << (bit - 48);
        } else {
            return Err(BuildError::TagBitOutOfRange { bit });
        }
    }
    Ok((mask_lo, mask_hi, mask_ex))
}
