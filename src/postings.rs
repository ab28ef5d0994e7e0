//! Posting-list builder & shard router (C8).

use std::collections::BTreeMap;

use crate::error::BuildError;
use crate::varint::encode_delta_stream;

/// Knuth multiplicative hash constant used to route tokenKeys to shards.
const HASH_MULTIPLIER: u64 = 2_654_435_761;

/// `shardId = (tokenKey * 2654435761) mod 2^32 mod shardCount`. A
/// `shard_count` of 0 or 1 always routes to shard 0.
pub fn shard_id(token_key: u32, shard_count: u32) -> u32 {
    if shard_count <= 1 {
        return 0;
    }
    let hashed = (token_key as u64 * HASH_MULTIPLIER) & 0xFFFF_FFFF;
    (hashed % shard_count as u64) as u32
}

/// Accumulates, for each distinct bigram token, the sorted list of
/// distinct docIds that contain it.
#[derive(Default)]
pub struct PostingsBuilder {
    by_token: std::collections::HashMap<String, Vec<i64>>,
    skipped_non_bmp: usize,
}

impl PostingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `doc_id` contains `token` at least once. Callers must
    /// already have deduplicated tokens per document.
    pub fn add(&mut self, token: &str, doc_id: i64) {
        self.by_token
            .entry(token.to_string())
            .or_default()
            .push(doc_id);
    }

    pub fn skipped_non_bmp(&self) -> usize {
        self.skipped_non_bmp
    }

    /// Resolve every token to its 32-bit key (dropping non-BMP tokens and
    /// tallying them), then sort by key. Fails on a key collision between
    /// two distinct bigrams, which cannot legitimately occur after
    /// normalization but would otherwise corrupt the dictionary.
    pub fn finalize(mut self) -> Result<Vec<(u32, Vec<i64>)>, BuildError> {
        let mut by_key: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
        for (token, doc_ids) in self.by_token.drain() {
            match crate::normalize::token_key(&token) {
                Some(key) => {
                    if by_key.contains_key(&key) {
                        return Err(BuildError::TokenKeyCollision { key });
                    }
                    by_key.insert(key, doc_ids);
                }
                None => self.skipped_non_bmp += 1,
            }
        }
        Ok(by_key.into_iter().collect())
    }
}

/// One dictionary entry after sharding: key, shard, local offset/length,
/// and document frequency (number of distinct docs carrying this token).
#[derive(Debug)]
pub struct ShardedEntry {
    pub key: u32,
    pub shard_id: u8,
    pub offset: u32,
    pub length: u16,
    pub doc_freq: u16,
}

/// Route every `(key, docIds)` pair into its shard, encoding each
/// posting list as a delta-varint stream (predecessor -1, so the first
/// delta equals `docId + 1`). Returns the per-shard byte buffers plus
/// the dictionary entries describing where each token landed.
pub fn route_and_encode(
    entries: Vec<(u32, Vec<i64>)>,
    shard_count: u32,
) -> Result<(Vec<Vec<u8>>, Vec<ShardedEntry>), BuildError> {
    let shard_count = shard_count.max(1);
    let mut shards = vec![Vec::new(); shard_count as usize];
    let mut dict_entries = Vec::with_capacity(entries.len());

    for (key, mut doc_ids) in entries {
        doc_ids.sort_unstable();
        doc_ids.dedup();
        let mut encoded = Vec::new();
        encode_delta_stream(&doc_ids, -1, &mut encoded)?;

        let shard = shard_id(key, shard_count);
        let shard_buf = &mut shards[shard as usize];
        let offset = u32::try_from(shard_buf.len()).map_err(|_| BuildError::FieldOverflow {
            field: "posting shard offset",
            value: shard_buf.len() as u64,
            max: u32::MAX as u64,
        })?;
        let length = u16::try_from(encoded.len()).map_err(|_| BuildError::FieldOverflow {
            field: "posting list length",
            value: encoded.len() as u64,
            max: u16::MAX as u64,
        })?;
        let doc_freq = u16::try_from(doc_ids.len()).map_err(|_| BuildError::FieldOverflow {
            field: "posting list doc frequency",
            value: doc_ids.len() as u64,
            max: u16::MAX as u64,
        })?;
        let shard_id_u8 = u8::try_from(shard).map_err(|_| BuildError::FieldOverflow {
            field: "dict shardId",
            value: shard as u64,
            max: u8::MAX as u64,
        })?;

        shard_buf.extend_from_slice(&encoded);
        dict_entries.push(ShardedEntry {
            key,
            shard_id: shard_id_u8,
            offset,
            length,
            doc_freq,
        });
    }

    Ok((shards, dict_entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shard_routes_everything_to_zero() {
        assert_eq!(shard_id(123, 0), 0);
        assert_eq!(shard_id(123, 1), 0);
    }

    #[test]
    fn shard_is_deterministic() {
        let a = shard_id(42, 8);
        let b = shard_id(42, 8);
        assert_eq!(a, b);
        assert!(a < 8);
    }

    #[test]
    fn distinct_keys_can_land_on_distinct_shards() {
        let shards: std::collections::HashSet<u32> =
            (0u32..1000).map(|k| shard_id(k, 8)).collect();
        assert!(shards.len() > 1);
    }

    #[test]
    fn builder_dedups_nothing_itself_but_finalize_sorts_by_key() {
        let mut builder = PostingsBuilder::new();
        builder.add("ba", 0);
        builder.add("ab", 0);
        let entries = builder.finalize().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].0 < entries[1].0);
    }

    #[test]
    fn non_bmp_tokens_are_skipped_and_counted() {
        let mut builder = PostingsBuilder::new();
        builder.add("\u{1F600}a", 0);
        builder.add("ab", 0);
        let finalized_skip_count = {
            let skip_before = builder.skipped_non_bmp();
            assert_eq!(skip_before, 0);
            let entries = builder.finalize().unwrap();
            assert_eq!(entries.len(), 1);
            entries.len()
        };
        assert_eq!(finalized_skip_count, 1);
    }

    #[test]
    fn route_and_encode_matches_doc_freq_and_first_delta() {
        let entries = vec![(1u32, vec![0i64, 1, 5])];
        let (shards, dict) = route_and_encode(entries, 1).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict[0].doc_freq, 3);
        assert_eq!(dict[0].shard_id, 0);
        assert_eq!(dict[0].offset, 0);
        assert_eq!(shards[0].len(), dict[0].length as usize);
    }

    #[test]
    fn shard_count_above_256_is_rejected_rather_than_silently_truncated() {
        // A token whose shard index exceeds 0xFF must be a fatal overflow,
        // not a wrapping `as u8` cast that corrupts the dictionary.
        let shard_count = 300;
        let key: u32 = (0..).find(|&k| shard_id(k, shard_count) > 255).unwrap();
        let entries = vec![(key, vec![0i64])];
        let err = route_and_encode(entries, shard_count).unwrap_err();
        assert!(matches!(err, BuildError::FieldOverflow { field: "dict shardId", .. }));
    }

    #[test]
    fn two_doc_single_token_scenario() {
        // Scenario 2 from the spec: docIds [0, 1] sharing one token ->
        // delta-varint predecessor -1 gives bytes [1, 1].
        let entries = vec![(7u32, vec![0i64, 1])];
        let (shards, _dict) = route_and_encode(entries, 1).unwrap();
        assert_eq!(shards[0], vec![1u8, 1u8]);
    }

    #[test]
    fn shard_routing_scenario() {
        // Scenario 6 from the spec: shardCount=4, keys {1, 0xFFFFFFFF}.
        assert_eq!(shard_id(1, 4), 1);
        assert_eq!(shard_id(0xFFFF_FFFF, 4), 3);
    }
}
