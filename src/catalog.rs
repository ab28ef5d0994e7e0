//! Tolerant catalog row model and per-document flag derivation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Wire shape of one `types`/`authors` tag entry.
#[derive(Debug, Deserialize, Default)]
pub struct TagRef {
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
}

/// Deserialize a list field that may be absent, `null`, or present with
/// the wrong JSON shape entirely (e.g. a string where an array was
/// expected). Any of those fold to an empty `Vec` instead of failing the
/// whole row; individual array elements that don't match `T` are dropped
/// the same way.
fn tolerant_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<T>(item).ok())
        .collect())
}

/// One row of the `comics.json` column, deserialized tolerantly: every
/// field is optional so a malformed or partial row degrades gracefully
/// rather than aborting the whole build.
#[derive(Debug, Deserialize, Default)]
pub struct CatalogRow {
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default, deserialize_with = "tolerant_list")]
    pub authors: Vec<TagRef>,
    #[serde(default, deserialize_with = "tolerant_list")]
    pub aliases: Vec<String>,
    #[serde(default, deserialize_with = "tolerant_list")]
    pub types: Vec<TagRef>,
    #[serde(default)]
    pub hidden: Option<serde_json::Value>,
    #[serde(default, rename = "isHideChapter")]
    pub is_hide_chapter: Option<serde_json::Value>,
    #[serde(default, rename = "canRead")]
    pub can_read: Option<serde_json::Value>,
    #[serde(default)]
    pub is_need_login: Option<serde_json::Value>,
    #[serde(default)]
    pub is_lock: Option<serde_json::Value>,
}

/// Best-effort coercion of a loosely-typed JSON value to an integer,
/// mirroring Python's permissive `int(x)` on already-parsed JSON.
fn coerce_int(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::Bool(b) => Some(*b as i64),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

fn truthy(value: &Option<serde_json::Value>) -> bool {
    value.as_ref().and_then(coerce_int).unwrap_or(0) != 0
}

/// Interpret a raw `canRead` value as a boolean, if it can be interpreted
/// at all: real booleans, recognizable strings (`"true"`/`"1"`/`"yes"`/...),
/// and numbers all count; anything else is "uninterpretable".
fn interpret_can_read(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => {
            match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "y" => Some(true),
                "0" | "false" | "no" | "n" => Some(false),
                _ => None,
            }
        }
        serde_json::Value::Number(_) => coerce_int(value).map(|v| v != 0),
        _ => None,
    }
}

/// The per-document flag byte: bit0 hidden, bit1 hideChapter, bit2
/// needLogin, bit3 isLock, bits4-5 tagMaskEx, bits6-7 reserved zero.
pub fn compute_flags(row: &CatalogRow, mask_ex: u8) -> u8 {
    let hidden = truthy(&row.hidden);

    // Python compares the raw JSON value with `== 1`, and `True == 1` holds
    // in Python, so a JSON `true` sets the bit exactly like a JSON `1`.
    let hide_chapter = matches!(
        &row.is_hide_chapter,
        Some(serde_json::Value::Number(n)) if n.as_i64() == Some(1)
    ) || matches!(&row.is_hide_chapter, Some(serde_json::Value::Bool(true)));

    let need_login = match row.can_read.as_ref().and_then(interpret_can_read) {
        Some(can_read) => !can_read,
        None => truthy(&row.is_need_login),
    };

    let is_lock = truthy(&row.is_lock);

    (hidden as u8)
        | ((hide_chapter as u8) << 1)
        | ((need_login as u8) << 2)
        | ((is_lock as u8) << 3)
        | ((mask_ex & 0b11) << 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row_with(fields: serde_json::Value) -> CatalogRow {
        serde_json::from_value(fields).unwrap()
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let row: CatalogRow = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(row.id, Some(1));
        assert!(row.title.is_none());
        assert!(row.authors.is_empty());
    }

    #[test]
    fn wrong_shaped_list_fields_fold_to_empty_instead_of_failing_the_row() {
        let row: CatalogRow =
            serde_json::from_str(r#"{"id": 1, "authors": null, "aliases": "oops", "types": 5}"#)
                .unwrap();
        assert_eq!(row.id, Some(1));
        assert!(row.authors.is_empty());
        assert!(row.aliases.is_empty());
        assert!(row.types.is_empty());
    }

    #[test]
    fn malformed_list_items_are_dropped_not_fatal() {
        let row: CatalogRow = serde_json::from_str(
            r#"{"id": 1, "authors": [{"tag_id": 1, "tag_name": "a"}, "garbage"], "aliases": ["ok", 5]}"#,
        )
        .unwrap();
        assert_eq!(row.authors.len(), 1);
        assert_eq!(row.authors[0].tag_id, Some(1));
        assert_eq!(row.aliases, vec!["ok".to_string()]);
    }

    #[test]
    fn hidden_nonzero_sets_bit0() {
        let row = row_with(json!({"id": 1, "hidden": 2}));
        assert_eq!(compute_flags(&row, 0) & 1, 1);
        let row = row_with(json!({"id": 1, "hidden": 0}));
        assert_eq!(compute_flags(&row, 0) & 1, 0);
    }

    #[test]
    fn hide_chapter_requires_exactly_one_or_true() {
        let row = row_with(json!({"id": 1, "isHideChapter": 1}));
        assert_eq!((compute_flags(&row, 0) >> 1) & 1, 1);
        let row = row_with(json!({"id": 1, "isHideChapter": 2}));
        assert_eq!((compute_flags(&row, 0) >> 1) & 1, 0);
        // Python's `obj.get("isHideChapter") == 1` is true for JSON `true`
        // too, since `True == 1` in Python.
        let row = row_with(json!({"id": 1, "isHideChapter": true}));
        assert_eq!((compute_flags(&row, 0) >> 1) & 1, 1);
        let row = row_with(json!({"id": 1, "isHideChapter": false}));
        assert_eq!((compute_flags(&row, 0) >> 1) & 1, 0);
    }

    #[test]
    fn can_read_false_sets_need_login() {
        let row = row_with(json!({"id": 1, "canRead": false}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 1);
        let row = row_with(json!({"id": 1, "canRead": true}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 0);
    }

    #[test]
    fn can_read_string_is_interpreted() {
        let row = row_with(json!({"id": 1, "canRead": "no"}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 1);
        let row = row_with(json!({"id": 1, "canRead": "yes"}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 0);
    }

    #[test]
    fn uninterpretable_can_read_falls_back_to_need_login_field() {
        let row = row_with(json!({"id": 1, "canRead": "maybe", "is_need_login": 1}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 1);
        let row = row_with(json!({"id": 1, "is_need_login": 0}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 0);
    }

    #[test]
    fn missing_can_read_falls_back_to_need_login_field() {
        let row = row_with(json!({"id": 1, "is_need_login": 1}));
        assert_eq!((compute_flags(&row, 0) >> 2) & 1, 1);
    }

    #[test]
    fn is_lock_sets_bit3() {
        let row = row_with(json!({"id": 1, "is_lock": 1}));
        assert_eq!((compute_flags(&row, 0) >> 3) & 1, 1);
    }

    #[test]
    fn tag_mask_ex_packed_into_bits_four_and_five() {
        let row = row_with(json!({"id": 1}));
        assert_eq!(compute_flags(&row, 0b11) >> 4, 0b11);
        assert_eq!(compute_flags(&row, 0b111) >> 4, 0b11); // top bit outside mask_ex ignored by caller
    }
}
