//! Unified error type for the index builder.

use thiserror::Error;

/// All errors that can occur while building the search artifacts.
#[derive(Error, Debug)]
pub enum BuildError {
    /// I/O error (file read/write, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error while reading the catalog table
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The catalog database file does not exist
    #[error("database file not found: {0}")]
    DbNotFound(String),

    /// More than 50 distinct tags were observed in the corpus
    #[error("tag space exceeds 50-bit ceiling: found {count} distinct tags")]
    TagCeilingExceeded { count: usize },

    /// An authorId fell outside the representable `uint16` range
    #[error("authorId {author_id} out of u16 range for comic {comic_id}")]
    AuthorIdOutOfRange { comic_id: i64, author_id: i64 },

    /// comicId sequence was not strictly increasing
    #[error("comicId sequence is not strictly increasing: {prev} then {got}")]
    NonMonotoneComicId { prev: i64, got: i64 },

    /// A tag bit position fell outside the encodable mask range
    #[error("tag bit {bit} exceeds the 50-bit encodable range")]
    TagBitOutOfRange { bit: usize },

    /// Duplicate token key after sorting the dictionary
    #[error("token key collision: {key:#010x} appears more than once")]
    TokenKeyCollision { key: u32 },

    /// A posting list or dictionary field overflowed its on-disk width
    #[error("{field} overflows its on-disk width ({value} > {max})")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A delta in a monotone sequence was not strictly positive
    #[error("non-positive delta ({delta}) while encoding a monotone sequence — encoder misuse")]
    NonPositiveDelta { delta: i64 },

    /// A varint encoder was asked to encode a negative value
    #[error("attempted to varint-encode a negative value: {0}")]
    NegativeVarint(i64),
}
