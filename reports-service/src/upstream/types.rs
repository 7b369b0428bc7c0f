//! Upstream record types.
//!
//! Items are stored and served exactly as the API returned them. Only the few
//! fields used for filtering and sorting are ever looked at.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field holding the editor-entered publish date.
pub const MANUAL_PUBLISH_FIELD: &str = "datum-a-cas-publikovani";

/// One collection item, kept as the raw JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(pub Value);

impl Item {
    /// The item's `fieldData.name`, or `""` when absent.
    pub fn name(&self) -> &str {
        self.field_str("name").unwrap_or("")
    }

    /// The item's `fieldData.slug`, or `""` when absent.
    pub fn slug(&self) -> &str {
        self.field_str("slug").unwrap_or("")
    }

    /// Milliseconds since the epoch used for date sorting.
    ///
    /// A non-empty manual publish date is the only candidate when present;
    /// `lastPublished` is used otherwise. Whichever is chosen sorts as 0 when
    /// it does not parse.
    pub fn publish_millis(&self) -> i64 {
        let chosen = match self.field_str(MANUAL_PUBLISH_FIELD) {
            Some(manual) if !manual.is_empty() => Some(manual),
            _ => self.0.get("lastPublished").and_then(Value::as_str),
        };
        chosen.and_then(parse_timestamp_millis).unwrap_or(0)
    }

    fn field_str(&self, field: &str) -> Option<&str> {
        self.0.get("fieldData")?.get(field)?.as_str()
    }
}

/// One page of `GET /collections/{id}/items/live`.
#[derive(Debug, Default, Deserialize)]
pub struct ItemsPage {
    /// Items on this page. Anything other than an array counts as empty.
    #[serde(default, deserialize_with = "items_or_empty")]
    pub items: Vec<Item>,
}

fn items_or_empty<'de, D>(deserializer: D) -> Result<Vec<Item>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values.into_iter().map(Item).collect(),
        _ => Vec::new(),
    })
}

/// Parse the timestamp shapes the CMS emits.
///
/// Accepts RFC 3339 (`2024-05-01T08:00:00.000Z`), a zoneless date-time read as
/// UTC, and a bare date at midnight UTC.
fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
