//! Content-addressed artifact writer and manifest v3 (external interface).

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::BuildError;

const KEEP_PREFIXES: &[&str] = &[
    "meta-lite.",
    "ngram.dict.",
    "ngram.index.",
    "authors.dict.",
    "tags.",
];

/// One content-addressed asset reference inside the manifest.
#[derive(Debug, Serialize)]
pub struct AssetRef {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

/// `stats` block of the manifest, matching build stats v5.
#[derive(Debug, Serialize)]
pub struct Stats {
    pub version: u32,
    pub count: usize,
    #[serde(rename = "authorDictCount")]
    pub author_dict_count: usize,
    #[serde(rename = "uniqueTokens")]
    pub unique_tokens: usize,
    #[serde(rename = "indexBytes")]
    pub index_bytes: usize,
    #[serde(rename = "indexShardCount")]
    pub index_shard_count: u32,
    #[serde(rename = "indexShardMode")]
    pub index_shard_mode: &'static str,
    #[serde(rename = "metaShardDocs")]
    pub meta_shard_docs: usize,
    #[serde(rename = "metaShardCount")]
    pub meta_shard_count: usize,
}

#[derive(Debug, Serialize)]
pub struct Assets {
    #[serde(rename = "metaShards")]
    pub meta_shards: Vec<AssetRef>,
    pub dict: AssetRef,
    pub authors: AssetRef,
    pub tags: AssetRef,
    #[serde(rename = "indexShards")]
    pub index_shards: Vec<AssetRef>,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub stats: Stats,
    pub assets: Assets,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Write `data` as `<stem>.<first-12-hex>.<ext>` under `out_dir`, returning
/// `(filename, digest, byte_len)`.
pub fn write_hashed(out_dir: &Path, stem: &str, ext: &str, data: &[u8]) -> Result<(String, String, u64), BuildError> {
    let digest = sha256_hex(data);
    let short = &digest[..12];
    let filename = format!("{stem}.{short}{ext}");
    fs::write(out_dir.join(&filename), data)?;
    Ok((filename, digest, data.len() as u64))
}

/// Serialize `value` as compact JSON with sorted keys and no `\u` escaping,
/// matching the reference byte-for-byte manifest/tags format.
pub fn json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, BuildError> {
    let json = serde_json::to_value(value)?;
    Ok(canonical_json(&json).into_bytes())
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap(), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => serde_json::to_string(other).unwrap(),
    }
}

/// Delete stale generated artifacts under `out_dir` that match one of the
/// known artifact prefixes but aren't in `keep`.
pub fn clean_generated(out_dir: &Path, keep: &BTreeSet<String>) -> Result<(), BuildError> {
    for entry in fs::read_dir(out_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if keep.contains(&name) {
            continue;
        }
        if KEEP_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
