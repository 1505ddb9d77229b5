//! Catalog records and the deduplicating item index.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::debug;

/// Field holding the record list when a page body is an object.
const LIST_FIELD: &str = "clips";

/// One record as it appears in a page body. Every field is optional; the
/// index decides which records are usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// Record identity.
    #[serde(default)]
    pub id: Option<String>,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Primary asset (audio) URL.
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Attribution shown as the artist.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl RawRecord {
    /// Converts into a [`CatalogItem`] when identity, title, and audio URL are
    /// all present and non-empty.
    #[must_use]
    pub fn into_item(self) -> Option<CatalogItem> {
        Some(CatalogItem {
            id: non_empty(self.id)?,
            title: non_empty(self.title)?,
            audio_url: non_empty(self.audio_url)?,
            cover_url: non_empty(self.image_url),
            display_name: non_empty(self.display_name),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A downloadable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Unique identity within a run.
    pub id: String,
    /// Display title, used for the output filename.
    pub title: String,
    /// Primary asset URL.
    pub audio_url: String,
    /// Optional cover asset URL.
    pub cover_url: Option<String>,
    /// Optional display / attribution name.
    pub display_name: Option<String>,
}

/// Decodes a page body into its records.
///
/// Accepts a bare JSON array or an object carrying the array under `clips`
/// (absent or `null` means an empty page). Each record decodes on its own; a
/// record of the wrong shape becomes an empty [`RawRecord`] so it still counts
/// towards the page size but is dropped by the index.
///
/// # Errors
///
/// Returns the JSON error when the body is neither an array nor an object.
pub fn parse_page_body(body: &[u8]) -> Result<Vec<RawRecord>, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PageBody {
        List(Vec<serde_json::Value>),
        Keyed(serde_json::Map<String, serde_json::Value>),
    }

    let values = match serde_json::from_slice::<PageBody>(body)? {
        PageBody::List(values) => values,
        PageBody::Keyed(mut object) => match object.remove(LIST_FIELD) {
            Some(serde_json::Value::Array(values)) => values,
            _ => Vec::new(),
        },
    };

    Ok(values
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).unwrap_or_else(|error| {
                debug!(%error, "undecodable record");
                RawRecord::default()
            })
        })
        .collect())
}

/// Items keyed by identity, in first-seen order.
///
/// The first record seen for an identity wins; later duplicates are dropped.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    items: Vec<CatalogItem>,
    positions: HashMap<String, usize>,
}

impl CatalogIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from pages, visiting them in ascending page order.
    #[must_use]
    pub fn from_pages(pages: BTreeMap<u32, Vec<RawRecord>>) -> Self {
        let mut index = Self::new();
        let mut dropped = 0usize;
        for records in pages.into_values() {
            for record in records {
                match record.into_item() {
                    Some(item) => {
                        index.insert(item);
                    }
                    None => dropped += 1,
                }
            }
        }
        if dropped > 0 {
            debug!(dropped, "skipped incomplete records");
        }
        index
    }

    /// Inserts `item` unless its identity is already present.
    ///
    /// Returns true when the item was added.
    pub fn insert(&mut self, item: CatalogItem) -> bool {
        if self.positions.contains_key(&item.id) {
            return false;
        }
        self.positions.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        true
    }

    /// Looks up an item by identity.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.positions.get(id).map(|&pos| &self.items[pos])
    }

    /// Number of unique items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates items in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str, audio: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            audio_url: Some(audio.to_string()),
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_parse_page_body_bare_array() {
        let body = br#"[{"id":"a","title":"A","audio_url":"https://x/a.mp3","image_url":"https://x/a.jpg"}]"#;
        let records = parse_page_body(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image_url.as_deref(), Some("https://x/a.jpg"));
    }

    #[test]
    fn test_parse_page_body_keyed_object() {
        let body = br#"{"clips":[{"id":"a"},{"id":"b"}],"num_total_results":2}"#;
        assert_eq!(parse_page_body(body).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_page_body_keyed_without_list_is_empty() {
        assert!(parse_page_body(br#"{"detail":"nothing here"}"#).unwrap().is_empty());
        assert!(parse_page_body(br#"{"clips":null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_page_body_malformed_record_kept_as_placeholder() {
        let body = br#"[{"id":17,"title":"bad"},{"id":"ok","title":"T","audio_url":"u"}]"#;
        let records = parse_page_body(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RawRecord::default());
        assert!(records[1].clone().into_item().is_some());
    }

    #[test]
    fn test_parse_page_body_rejects_scalar() {
        assert!(parse_page_body(b"\"nope\"").is_err());
        assert!(parse_page_body(b"<html>").is_err());
    }

    #[test]
    fn test_into_item_requires_id_title_and_audio() {
        assert!(record("a", "A", "u").into_item().is_some());
        assert!(record("", "A", "u").into_item().is_none());
        assert!(record("a", "", "u").into_item().is_none());
        assert!(record("a", "A", "").into_item().is_none());
        assert!(RawRecord::default().into_item().is_none());
    }

    #[test]
    fn test_into_item_blank_optionals_become_none() {
        let mut raw = record("a", "A", "u");
        raw.image_url = Some(String::new());
        raw.display_name = Some("nova".to_string());
        let item = raw.into_item().unwrap();
        assert_eq!(item.cover_url, None);
        assert_eq!(item.display_name.as_deref(), Some("nova"));
    }

    #[test]
    fn test_from_pages_first_occurrence_by_page_order_wins() {
        let mut pages = BTreeMap::new();
        // Inserted out of order on purpose; page 1 must still win.
        pages.insert(2, vec![record("dup", "Later", "u2"), record("b", "B", "ub")]);
        pages.insert(1, vec![record("dup", "First", "u1")]);

        let index = CatalogIndex::from_pages(pages);
        assert_eq!(index.len(), 2);
        let dup = index.get("dup").unwrap();
        assert_eq!(dup.title, "First");
        assert_eq!(dup.audio_url, "u1");
        let order: Vec<_> = index.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(order, vec!["dup", "b"]);
    }

    #[test]
    fn test_from_pages_drops_incomplete_without_affecting_others() {
        let mut pages = BTreeMap::new();
        pages.insert(
            1,
            vec![
                record("a", "A", "ua"),
                RawRecord {
                    id: Some("no-audio".to_string()),
                    title: Some("T".to_string()),
                    ..RawRecord::default()
                },
                record("c", "C", "uc"),
            ],
        );

        let index = CatalogIndex::from_pages(pages);
        assert_eq!(index.len(), 2);
        assert!(index.get("no-audio").is_none());
        assert!(index.get("c").is_some());
    }

    #[test]
    fn test_insert_reports_duplicates() {
        let mut index = CatalogIndex::new();
        assert!(index.insert(record("a", "A", "u").into_item().unwrap()));
        assert!(!index.insert(record("a", "Other", "v").into_item().unwrap()));
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());
    }
}
