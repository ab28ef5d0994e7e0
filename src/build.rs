//! Build driver (C11): streams the catalog table once and wires every
//! other component together into the final artifact set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::authors::pack_authors_dict_bin;
use crate::catalog::{compute_flags, CatalogRow};
use crate::dict::pack_dict_bin_v3;
use crate::error::BuildError;
use crate::manifest::{clean_generated, json_bytes, write_hashed, AssetRef, Assets, Manifest, Stats};
use crate::meta::{pack_meta_bin, MetaDoc};
use crate::normalize::{generate_bigrams, normalize_text};
use crate::postings::{route_and_encode, PostingsBuilder};
use crate::tags::{compute_tag_mask, TagCollector};

pub const NGRAM_N: u16 = 2;
const DEFAULT_META_SHARD_DOCS: usize = 4096;
const DEFAULT_INDEX_SHARD_COUNT: u32 = 8;

/// Options controlling a single build run, mirroring the CLI surface.
pub struct BuildOptions {
    pub db_path: PathBuf,
    pub out_dir: PathBuf,
    pub generated_at: Option<String>,
    pub clean: bool,
    pub meta_shard_docs: usize,
    pub index_shard_count: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/catalog.sqlite3"),
            out_dir: PathBuf::from("public/assets"),
            generated_at: None,
            clean: false,
            meta_shard_docs: DEFAULT_META_SHARD_DOCS,
            index_shard_count: DEFAULT_INDEX_SHARD_COUNT,
        }
    }
}

/// Paths written by a completed build, reported back to the caller for
/// user-facing output.
pub struct BuildReport {
    pub manifest_path: PathBuf,
    pub written_files: Vec<PathBuf>,
    pub stats: Stats,
}

/// A single decoded, enriched document ready for meta packing and
/// posting-list extraction.
#[derive(Debug)]
struct DocRecord {
    comic_id: i64,
    title: String,
    cover_raw: String,
    author_ids: Vec<u16>,
    alias_text: String,
    tag_mask_lo: u32,
    tag_mask_hi: u16,
    flags: u8,
    search_text: Vec<String>,
}

fn open_connection(db_path: &Path) -> Result<Connection, BuildError> {
    if !db_path.exists() {
        return Err(BuildError::DbNotFound(db_path.display().to_string()));
    }
    Ok(Connection::open(db_path)?)
}

fn fetch_json_rows(conn: &Connection) -> Result<Vec<String>, BuildError> {
    let mut stmt = conn.prepare("SELECT json FROM comics ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn collect_tags(rows: &[String]) -> TagCollector {
    let mut collector = TagCollector::new();
    for raw in rows {
        let Ok(row) = serde_json::from_str::<CatalogRow>(raw) else {
            continue;
        };
        for tag in &row.types {
            let Some(tag_id) = tag.tag_id else { continue };
            collector.observe(tag_id, tag.tag_name.as_deref());
        }
    }
    collector
}

/// Second pass over the decoded rows: builds per-document records, the
/// author name table, and the unresolved (per-document, deduplicated)
/// posting-builder input.
#[allow(clippy::type_complexity)]
fn build_documents(
    rows: &[String],
    tags: &crate::tags::TagSpace,
) -> Result<(Vec<DocRecord>, BTreeMap<i64, String>), BuildError> {
    let mut docs = Vec::with_capacity(rows.len());
    let mut author_names: BTreeMap<i64, String> = BTreeMap::new();
    let mut prev_comic_id: Option<i64> = None;

    for raw in rows {
        let Ok(row) = serde_json::from_str::<CatalogRow>(raw) else {
            continue;
        };
        let Some(comic_id) = row.id else { continue };

        if let Some(prev) = prev_comic_id
            && comic_id <= prev
        {
            return Err(BuildError::NonMonotoneComicId { prev, got: comic_id });
        }
        prev_comic_id = Some(comic_id);

        let title = row.title.clone().unwrap_or_default();
        let cover_raw = row.cover.clone().unwrap_or_default();
        let cover_raw = cover_raw.strip_prefix("https://").unwrap_or(&cover_raw).to_string();

        let mut author_ids = Vec::new();
        let mut author_texts = Vec::new();
        for author in &row.authors {
            let Some(aid) = author.tag_id else { continue };
            let aid16 = u16::try_from(aid).map_err(|_| BuildError::AuthorIdOutOfRange {
                comic_id,
                author_id: aid,
            })?;
            let Some(name) = author.tag_name.as_deref() else { continue };
            if name.is_empty() {
                continue;
            }
            author_ids.push(aid16);
            author_texts.push(name.to_string());
            author_names.entry(aid).or_insert_with(|| name.to_string());
        }

        let aliases: Vec<String> = row.aliases.iter().filter(|a| !a.is_empty()).cloned().collect();
        let tag_ids: Vec<i64> = row.types.iter().filter_map(|t| t.tag_id).collect();
        let (mask_lo, mask_hi, mask_ex) = compute_tag_mask(tags, &tag_ids)?;
        let flags = compute_flags(&row, mask_ex);

        let mut search_text = Vec::with_capacity(1 + aliases.len() + author_texts.len());
        search_text.push(title.clone());
        search_text.extend(aliases.iter().cloned());
        search_text.extend(author_texts);

        docs.push(DocRecord {
            comic_id,
            title,
            cover_raw,
            author_ids,
            alias_text: aliases.join("\u{001F}"),
            tag_mask_lo: mask_lo,
            tag_mask_hi: mask_hi,
            flags,
            search_text,
        });
    }

    Ok((docs, author_names))
}

fn collect_postings(docs: &[DocRecord]) -> PostingsBuilder {
    let mut builder = PostingsBuilder::new();
    for (doc_id, doc) in docs.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for text in &doc.search_text {
            if text.is_empty() {
                continue;
            }
            let normalized = normalize_text(text);
            for bigram in generate_bigrams(&normalized) {
                seen.insert(bigram);
            }
        }
        for token in seen {
            builder.add(&token, doc_id as i64);
        }
    }
    builder
}

/// Run a full build: read the catalog, encode every artifact, and write
/// the content-addressed files plus the manifest into `options.out_dir`.
pub fn run_build(options: &BuildOptions) -> Result<BuildReport, BuildError> {
    std::fs::create_dir_all(&options.out_dir)?;

    let conn = open_connection(&options.db_path)?;
    let rows = fetch_json_rows(&conn)?;
    drop(conn);
    info!(rows = rows.len(), "loaded catalog rows");

    let tag_collector = collect_tags(&rows);
    let tag_space = tag_collector.finalize()?;
    info!(tags = tag_space.entries().len(), "collected tag space");

    let (docs, author_names) = build_documents(&rows, &tag_space)?;
    info!(docs = docs.len(), "built document records");

    let postings_builder = collect_postings(&docs);
    let skipped_non_bmp = postings_builder.skipped_non_bmp();
    let token_entries = postings_builder.finalize()?;
    if skipped_non_bmp > 0 {
        warn!(skipped_non_bmp, "tokens could not be encoded as a 2-unit utf-16 key and were skipped");
    }

    let index_shard_count = if options.index_shard_count == 0 { 1 } else { options.index_shard_count };
    let (index_shards, dict_entries) = route_and_encode(token_entries, index_shard_count)?;
    let index_bytes: usize = index_shards.iter().map(|s| s.len()).sum();
    let unique_tokens = dict_entries.len();

    let dict_bin = pack_dict_bin_v3(NGRAM_N, &dict_entries)?;
    let authors_dict_bin = pack_authors_dict_bin(&author_names)?;

    let tags_json = serde_json::json!({
        "version": 1,
        "tags": tag_space.sorted_for_json(),
    });
    let tags_bytes = json_bytes(&tags_json)?;

    let meta_shard_docs = if options.meta_shard_docs == 0 {
        docs.len().max(1)
    } else {
        options.meta_shard_docs
    };

    let mut meta_parts = Vec::new();
    for chunk in docs.chunks(meta_shard_docs) {
        let meta_docs: Vec<MetaDoc> = chunk
            .iter()
            .map(|d| MetaDoc {
                comic_id: d.comic_id,
                title: d.title.clone(),
                cover_raw: d.cover_raw.clone(),
                author_ids: d.author_ids.clone(),
                alias_text: d.alias_text.clone(),
                tag_mask_lo: d.tag_mask_lo,
                tag_mask_hi: d.tag_mask_hi,
                flags: d.flags,
            })
            .collect();
        meta_parts.push(pack_meta_bin(&meta_docs)?);
    }
    if meta_parts.is_empty() {
        meta_parts.push(pack_meta_bin(&[])?);
    }

    let generated_at = options
        .generated_at
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    let mut written_files = Vec::new();
    let mut keep = BTreeSet::new();
    keep.insert(".gitkeep".to_string());
    keep.insert("manifest.json".to_string());

    let mut meta_assets = Vec::new();
    for (i, data) in meta_parts.iter().enumerate() {
        let stem = format!("meta-lite.s{i:03}");
        let (name, sha, bytes) = write_hashed(&options.out_dir, &stem, ".bin", data)?;
        keep.insert(name.clone());
        written_files.push(options.out_dir.join(&name));
        meta_assets.push(AssetRef { path: format!("assets/{name}"), sha256: sha, bytes });
    }

    let (dict_name, dict_sha, dict_bytes_len) = write_hashed(&options.out_dir, "ngram.dict", ".bin", &dict_bin)?;
    keep.insert(dict_name.clone());
    written_files.push(options.out_dir.join(&dict_name));

    let (authors_name, authors_sha, authors_bytes_len) =
        write_hashed(&options.out_dir, "authors.dict", ".bin", &authors_dict_bin)?;
    keep.insert(authors_name.clone());
    written_files.push(options.out_dir.join(&authors_name));

    let (tags_name, tags_sha, tags_bytes_len) = write_hashed(&options.out_dir, "tags", ".json", &tags_bytes)?;
    keep.insert(tags_name.clone());
    written_files.push(options.out_dir.join(&tags_name));

    let mut index_assets = Vec::new();
    for (i, data) in index_shards.iter().enumerate() {
        let stem = format!("ngram.index.h{i:03}");
        let (name, sha, bytes) = write_hashed(&options.out_dir, &stem, ".bin", data)?;
        keep.insert(name.clone());
        written_files.push(options.out_dir.join(&name));
        index_assets.push(AssetRef { path: format!("assets/{name}"), sha256: sha, bytes });
    }

    let stats = Stats {
        version: 5,
        count: docs.len(),
        author_dict_count: author_names.len(),
        unique_tokens,
        index_bytes,
        index_shard_count,
        index_shard_mode: "tokenKeyHash",
        meta_shard_docs,
        meta_shard_count: meta_parts.len(),
    };

    let manifest = Manifest {
        version: 3,
        generated_at,
        stats: Stats {
            version: stats.version,
            count: stats.count,
            author_dict_count: stats.author_dict_count,
            unique_tokens: stats.unique_tokens,
            index_bytes: stats.index_bytes,
            index_shard_count: stats.index_shard_count,
            index_shard_mode: stats.index_shard_mode,
            meta_shard_docs: stats.meta_shard_docs,
            meta_shard_count: stats.meta_shard_count,
        },
        assets: Assets {
            meta_shards: meta_assets,
            dict: AssetRef { path: format!("assets/{dict_name}"), sha256: dict_sha, bytes: dict_bytes_len },
            authors: AssetRef { path: format!("assets/{authors_name}"), sha256: authors_sha, bytes: authors_bytes_len },
            tags: AssetRef { path: format!("assets/{tags_name}"), sha256: tags_sha, bytes: tags_bytes_len },
            index_shards: index_assets,
        },
    };

    let manifest_bytes = json_bytes(&manifest)?;
    let manifest_path = options.out_dir.join("manifest.json");
    std::fs::write(&manifest_path, &manifest_bytes)?;

    if options.clean {
        clean_generated(&options.out_dir, &keep)?;
    }

    info!(
        count = stats.count,
        unique_tokens = stats.unique_tokens,
        index_bytes = stats.index_bytes,
        "build complete"
    );

    Ok(BuildReport { manifest_path, written_files, stats })
}
