//! Paging: `sortBy` / `page` / `limit` parsing and page execution.
//!
//! A page is produced from two independent reads over the same predicate,
//! a COUNT and the LIMIT/OFFSET slice. They are not wrapped in a
//! transaction, so under concurrent writes the total may drift from the
//! slice by the rows written in between.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use super::query_builder::ListingQueryBuilder;
use super::types::{Page, PageRequest, SortDirection, SortKey};

/// Page size when `limit` is absent or invalid.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest accepted page size.
pub const MAX_LIMIT: u32 = 100;

impl PageRequest {
    /// Parse paging options from raw query parameters.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            sort: params
                .get("sortBy")
                .map(|s| parse_sort(s))
                .unwrap_or_default(),
            page: parse_positive(params.get("page")).unwrap_or(1),
            limit: parse_positive(params.get("limit"))
                .unwrap_or(DEFAULT_LIMIT)
                .min(MAX_LIMIT),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            sort: Vec::new(),
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Parse a comma-separated `sortBy` value.
///
/// Accepts `field`, `-field`, `field:asc` and `field:desc`.
pub fn parse_sort(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            if let Some(field) = entry.strip_prefix('-') {
                return Some(SortKey::new(field.trim(), SortDirection::Desc));
            }
            match entry.split_once(':') {
                Some((field, dir)) if dir.trim().eq_ignore_ascii_case("desc") => {
                    Some(SortKey::new(field.trim(), SortDirection::Desc))
                }
                Some((field, _)) => Some(SortKey::new(field.trim(), SortDirection::Asc)),
                None => Some(SortKey::new(entry, SortDirection::Asc)),
            }
        })
        .filter(|key| !key.field.is_empty())
        .collect()
}

fn parse_positive(value: Option<&String>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Run the count and slice reads for one page.
pub async fn paginate<T>(
    pool: &PgPool,
    builder: &ListingQueryBuilder<'_>,
    request: &PageRequest,
) -> Result<Page<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let count_sql = builder.build_count();
    let page_sql = builder.build(request);

    let count = sqlx::query_scalar::<_, i64>(&count_sql).fetch_one(pool);
    let rows = sqlx::query_as::<_, T>(&page_sql).fetch_all(pool);

    let (total, results) = tokio::try_join!(count, rows).context("failed to execute listing query")?;

    Ok(Page::new(
        results,
        u64::try_from(total).unwrap_or_default(),
        request.page,
        request.limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_absent() {
        let req = PageRequest::from_params(&HashMap::new());
        assert_eq!(req, PageRequest::default());
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 10);
        assert!(req.sort.is_empty());
    }

    #[test]
    fn invalid_and_non_positive_values_fall_back() {
        for (page, limit) in [("0", "0"), ("-2", "-5"), ("abc", "1.5"), ("", "")] {
            let req = PageRequest::from_params(&params(&[("page", page), ("limit", limit)]));
            assert_eq!(req.page, 1, "page={page}");
            assert_eq!(req.limit, 10, "limit={limit}");
        }
    }

    #[test]
    fn limit_is_capped() {
        let req = PageRequest::from_params(&params(&[("limit", "5000")]));
        assert_eq!(req.limit, MAX_LIMIT);
    }

    #[test]
    fn third_page_of_twenty_five() {
        let req = PageRequest::from_params(&params(&[("limit", "10"), ("page", "3")]));
        assert_eq!(req.offset(), 20);

        let page: Page<u32> = Page::new((21..=25).collect(), 25, req.page, req.limit);
        assert_eq!(page.results.len(), 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_results, 25);
    }

    #[test]
    fn sort_prefix_and_suffix_forms() {
        assert_eq!(
            parse_sort("-price, title,createdAt:desc,bedrooms:asc"),
            vec![
                SortKey::new("price", SortDirection::Desc),
                SortKey::new("title", SortDirection::Asc),
                SortKey::new("createdAt", SortDirection::Desc),
                SortKey::new("bedrooms", SortDirection::Asc),
            ]
        );
    }

    #[test]
    fn sort_skips_empty_entries() {
        assert!(parse_sort(" , -, :desc").is_empty());
    }
}
