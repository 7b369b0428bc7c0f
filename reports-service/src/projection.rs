//! Filtering, sorting and paging of one snapshot.
//!
//! [`project`] is a pure function of its inputs: the same items and
//! parameters always give the same page.

use std::cmp::Reverse;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::upstream::Item;

/// Largest page a client can ask for.
pub const MAX_LIMIT: usize = 100;

/// Annual report titles, e.g. `Výroční zpráva 2023`.
static REPORT_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Výroční zpráva\s[0-9]{4}$").expect("report title pattern is valid")
});

/// Order of the returned items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest publish date first
    DateAsc,
    /// Newest publish date first
    #[default]
    DateDesc,
    /// Keep snapshot order
    Unsorted,
}

/// Which items to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemFilter {
    #[default]
    None,
    /// Only annual reports
    Reports,
    /// Everything except annual reports ("aktuality")
    NonReports,
}

impl ItemFilter {
    /// Label echoed back in response metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemFilter::None => "none",
            ItemFilter::Reports => "reports",
            ItemFilter::NonReports => "aktuality",
        }
    }
}

/// Validated request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    /// Page size, always within `0..=MAX_LIMIT`
    pub limit: usize,
    pub offset: usize,
    pub sort: SortOrder,
    pub filter: ItemFilter,
    pub exclude_slug: Option<String>,
    pub force_refresh: bool,
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            limit: MAX_LIMIT,
            offset: 0,
            sort: SortOrder::default(),
            filter: ItemFilter::default(),
            exclude_slug: None,
            force_refresh: false,
        }
    }
}

/// One page of a projected snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Matching items before paging
    pub total: usize,
    pub has_more: bool,
}

/// Whether an item is an annual report.
pub fn is_report(item: &Item) -> bool {
    REPORT_TITLE.is_match(item.name().trim())
}

/// Filter, exclude, sort and page `items`.
pub fn project(items: &[Item], params: &QueryParameters) -> Page {
    let mut selected: Vec<&Item> = items
        .iter()
        .filter(|item| match params.filter {
            ItemFilter::None => true,
            ItemFilter::Reports => is_report(item),
            ItemFilter::NonReports => !is_report(item),
        })
        .filter(|item| match params.exclude_slug.as_deref() {
            Some(slug) => item.slug() != slug,
            None => true,
        })
        .collect();

    // Stable: ties keep snapshot order
    match params.sort {
        SortOrder::DateAsc => selected.sort_by_cached_key(|item| item.publish_millis()),
        SortOrder::DateDesc => {
            selected.sort_by_cached_key(|item| Reverse(item.publish_millis()))
        }
        SortOrder::Unsorted => {}
    }

    let limit = params.limit.min(MAX_LIMIT);
    let total = selected.len();
    let page = selected
        .into_iter()
        .skip(params.offset)
        .take(limit)
        .cloned()
        .collect();

    Page {
        items: page,
        total,
        has_more: params.offset.saturating_add(limit) < total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(name: &str, slug: &str, published: &str) -> Item {
        Item(json!({
            "fieldData": { "name": name, "slug": slug },
            "lastPublished": published
        }))
    }

    fn slugs(page: &Page) -> Vec<&str> {
        page.items.iter().map(Item::slug).collect()
    }

    fn params() -> QueryParameters {
        QueryParameters::default()
    }

    /// 150 items with three annual reports spread through the collection.
    fn large_collection() -> Vec<Item> {
        (0..150)
            .map(|i| match i {
                10 => item("Výroční zpráva 2021", "vz-2021", "2022-03-01T00:00:00Z"),
                70 => item("Výroční zpráva 2023", "vz-2023", "2024-03-01T00:00:00Z"),
                140 => item("  Výroční zpráva 2022 ", "vz-2022", "2023-03-01T00:00:00Z"),
                _ => item(&format!("Novinka {i}"), &format!("n-{i}"), "2021-01-01T00:00:00Z"),
            })
            .collect()
    }

    #[test]
    fn test_is_report() {
        assert!(is_report(&item("Výroční zpráva 2020", "a", "")));
        assert!(is_report(&item(" Výroční zpráva 2020\n", "a", "")));
        assert!(!is_report(&item("Výroční zpráva 20", "a", "")));
        assert!(!is_report(&item("Výroční zpráva 2020 – shrnutí", "a", "")));
        assert!(!is_report(&item("Vyrocni zprava 2020", "a", "")));
        assert!(!is_report(&item("", "a", "")));
    }

    #[test]
    fn test_reports_scenario() {
        let items = large_collection();
        let page = project(
            &items,
            &QueryParameters {
                filter: ItemFilter::Reports,
                limit: 10,
                ..params()
            },
        );

        assert_eq!(page.total, 3);
        assert!(!page.has_more);
        assert_eq!(slugs(&page), vec!["vz-2023", "vz-2022", "vz-2021"]);
    }

    #[test]
    fn test_non_reports_is_complement() {
        let items = large_collection();
        let page = project(
            &items,
            &QueryParameters {
                filter: ItemFilter::NonReports,
                ..params()
            },
        );

        assert_eq!(page.total, 147);
        assert!(page.items.iter().all(|i| !is_report(i)));
        assert!(page.has_more);
    }

    #[test]
    fn test_filter_idempotent() {
        let items = large_collection();
        let reports = QueryParameters {
            filter: ItemFilter::Reports,
            sort: SortOrder::Unsorted,
            ..params()
        };

        let once = project(&items, &reports);
        let twice = project(&once.items, &reports);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let items = large_collection();
        let query = QueryParameters {
            limit: 7,
            offset: 3,
            sort: SortOrder::DateAsc,
            ..params()
        };

        assert_eq!(project(&items, &query), project(&items, &query));
    }

    #[test]
    fn test_exclude_slug() {
        let items = vec![
            item("A", "a", "2020-01-01T00:00:00Z"),
            item("B", "b", "2020-01-02T00:00:00Z"),
        ];
        let page = project(
            &items,
            &QueryParameters {
                exclude_slug: Some("b".to_string()),
                ..params()
            },
        );

        assert_eq!(slugs(&page), vec!["a"]);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_sort_is_stable_and_directional() {
        let items = vec![
            item("A", "a", "2020-01-02T00:00:00Z"),
            item("B", "b", "not a date"),
            item("C", "c", "2020-01-01T00:00:00Z"),
            item("D", "d", "2020-01-02T00:00:00Z"),
        ];

        let asc = project(
            &items,
            &QueryParameters {
                sort: SortOrder::DateAsc,
                ..params()
            },
        );
        assert_eq!(slugs(&asc), vec!["b", "c", "a", "d"]);

        let desc = project(&items, &params());
        assert_eq!(slugs(&desc), vec!["a", "d", "c", "b"]);

        let unsorted = project(
            &items,
            &QueryParameters {
                sort: SortOrder::Unsorted,
                ..params()
            },
        );
        assert_eq!(slugs(&unsorted), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_pagination_invariants() {
        let items = large_collection();

        for offset in [0, 1, 50, 99, 149, 150, 151, 400] {
            for limit in [0, 1, 10, 100] {
                let page = project(
                    &items,
                    &QueryParameters {
                        limit,
                        offset,
                        ..params()
                    },
                );

                let expected_len = limit.min(page.total.saturating_sub(offset));
                assert_eq!(page.items.len(), expected_len, "offset={offset} limit={limit}");
                assert_eq!(page.has_more, offset + limit < page.total);
                assert_eq!(page.total, 150);
            }
        }
    }

    #[test]
    fn test_limit_is_clamped() {
        let items = large_collection();
        let page = project(
            &items,
            &QueryParameters {
                limit: 1_000,
                ..params()
            },
        );

        assert_eq!(page.items.len(), MAX_LIMIT);
        assert!(page.has_more);
    }

    #[test]
    fn test_empty_collection() {
        let page = project(&[], &params());

        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
    }
}
