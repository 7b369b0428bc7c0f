//! Query string parsing.
//!
//! Bad values never fail a request; each parameter falls back to its default.

use url::form_urlencoded;

use crate::projection::{ItemFilter, QueryParameters, SortOrder, MAX_LIMIT};

/// Parse `limit`, `offset`, `sort`, `filter`, `excludeSlug` and `refresh`.
///
/// When a key repeats, the last value wins.
pub fn parse_query(raw: Option<&str>) -> QueryParameters {
    let mut params = QueryParameters::default();

    let Some(raw) = raw else {
        return params;
    };

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "limit" => params.limit = parse_limit(&value),
            "offset" => params.offset = parse_offset(&value),
            "sort" => params.sort = parse_sort(&value),
            "filter" => params.filter = parse_filter(&value),
            "excludeSlug" => {
                let slug = value.trim();
                params.exclude_slug = (!slug.is_empty()).then(|| slug.to_string());
            }
            "refresh" => params.force_refresh = value == "true",
            _ => {}
        }
    }

    params
}

fn parse_limit(value: &str) -> usize {
    match leading_integer(value) {
        Some(n) => n.clamp(0, MAX_LIMIT as i64) as usize,
        None => MAX_LIMIT,
    }
}

fn parse_offset(value: &str) -> usize {
    leading_integer(value)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// Optional sign plus the leading digits, ignoring whatever follows.
///
/// `"5abc"` is 5 and `"abc"` is `None`. Out-of-range values saturate.
fn leading_integer(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    let n = match rest[..digits].parse::<i64>() {
        Ok(n) => n,
        Err(_) => i64::MAX,
    };
    Some(if negative { -n } else { n })
}

/// `date-asc`, anything else starting with `date` is descending, an empty
/// value is the default, and any other value leaves snapshot order alone.
fn parse_sort(value: &str) -> SortOrder {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        SortOrder::default()
    } else if value == "date-asc" {
        SortOrder::DateAsc
    } else if value.starts_with("date") {
        SortOrder::DateDesc
    } else {
        SortOrder::Unsorted
    }
}

fn parse_filter(value: &str) -> ItemFilter {
    match value.trim().to_lowercase().as_str() {
        "reports" => ItemFilter::Reports,
        "aktuality" => ItemFilter::NonReports,
        _ => ItemFilter::None,
    }
}
