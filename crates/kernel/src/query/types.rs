//! Listing query types.
//!
//! Provides the value types that flow through a listing request:
//! - FilterValue / Filter: normalized, typed filter input
//! - FieldKind / FieldDef / ResourceSchema: per-resource field declarations
//! - SortKey / PageRequest: ordering and paging input
//! - Page: one page of results plus paging totals

use std::collections::BTreeMap;

use serde::Serialize;

/// A single normalized filter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// One literal value.
    Scalar(String),

    /// Match any of these values.
    Set(Vec<String>),

    /// Inclusive bounds. At least one bound is present.
    Range {
        min: Option<String>,
        max: Option<String>,
    },
}

/// Normalized filter keyed by public field name.
///
/// Keys are iterated in sorted order so compiled SQL is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    entries: BTreeMap<String, FilterValue>,
}

impl Filter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for a field, replacing any earlier one.
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.entries.insert(field.into(), value);
    }

    /// Builder-style [`Filter::insert`].
    pub fn with(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.insert(field, value);
        self
    }

    /// Value for a field, if present.
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.entries.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a field's filter values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Case-insensitive substring match.
    Text,
    /// Exact string equality.
    Keyword,
    /// Numeric equality and ranges.
    Numeric,
    /// `"true"` / `"false"` only.
    Boolean,
    /// UUID reference to another record.
    Reference,
    /// Timestamp column. Sortable, not filterable.
    Timestamp,
}

/// A field exposed to listing requests.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Public (camelCase) name used in query strings.
    pub key: &'static str,
    /// Backing column on the resource table.
    pub column: &'static str,
    pub kind: FieldKind,
    /// Accepts `min<Key>` / `max<Key>` range parameters.
    pub range: bool,
    /// For boolean flags: timestamp column after which the flag no longer holds.
    pub expiry: Option<&'static str>,
}

impl FieldDef {
    pub const fn new(key: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            column,
            kind,
            range: false,
            expiry: None,
        }
    }

    /// Mark the field as accepting range parameters.
    pub const fn ranged(mut self) -> Self {
        self.range = true;
        self
    }

    /// Treat a boolean flag as false once `column` is in the past.
    pub const fn expires_with(mut self, column: &'static str) -> Self {
        self.expiry = Some(column);
        self
    }
}

/// A related record rendered as a nested JSON object.
///
/// Compiled to a `LEFT JOIN` plus a `json_build_object` projection that
/// yields NULL when the related row is absent.
#[derive(Debug, Clone, Copy)]
pub struct Embed {
    /// Foreign key column on the base table.
    pub column: &'static str,
    /// Related table.
    pub table: &'static str,
    /// Alias for the joined table.
    pub join_alias: &'static str,
    /// Output column name of the nested object.
    pub alias: &'static str,
    /// `(json key, related column)` pairs.
    pub fields: &'static [(&'static str, &'static str)],
}

/// Columns returned by a listing query.
#[derive(Debug, Clone, Copy)]
pub enum Projection {
    /// `table.*`
    AllColumns,
    /// An explicit safe column list plus an embedded related record.
    Columns {
        columns: &'static [&'static str],
        embed: Option<Embed>,
    },
}

/// Static description of a listable resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    pub table: &'static str,
    /// Fields accepted as filters and sort keys.
    pub fields: &'static [FieldDef],
    /// Whether the table has an `is_deleted` flag that listings must honor.
    pub soft_delete: bool,
    pub projection: Projection,
}

impl ResourceSchema {
    /// Look up a field by its public name.
    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Whether `key` is on this resource's filter allow-list.
    pub fn allows(&self, key: &str) -> bool {
        self.field(key)
            .is_some_and(|f| f.kind != FieldKind::Timestamp)
    }

    /// Fields that accept `min`/`max` parameters.
    pub fn range_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.range)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One parsed `sortBy` entry, still keyed by public field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Sort and paging options for one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub sort: Vec<SortKey>,
    /// 1-indexed page number.
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub total_results: u64,
}

impl<T> Page<T> {
    /// Create a page with paging calculations.
    pub fn new(results: Vec<T>, total_results: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit > 0 {
            total_results.div_ceil(u64::from(limit))
        } else {
            0
        };

        Self {
            results,
            page,
            limit,
            total_pages,
            total_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_total_pages_rounds_up() {
        let page: Page<u32> = Page::new(vec![21, 22, 23, 24, 25], 25, 3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_results, 25);
    }

    #[test]
    fn huge_totals_do_not_wrap() {
        let page: Page<u32> = Page::new(vec![], u64::MAX, 1, 1);
        assert_eq!(page.total_pages, u64::MAX);
    }

    #[test]
    fn page_with_no_results() {
        let page: Page<u32> = Page::new(vec![], 0, 1, 10);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn page_serializes_camel_case() {
        let page: Page<u32> = Page::new(vec![1], 1, 1, 10);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["totalResults"], 1);
        assert!(json["results"].is_array());
    }

    #[test]
    fn page_request_offset() {
        let req = PageRequest {
            sort: vec![],
            page: 3,
            limit: 10,
        };
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn filter_iterates_in_key_order() {
        let filter = Filter::new()
            .with("type", FilterValue::Scalar("Buy".into()))
            .with("city", FilterValue::Scalar("Dhaka".into()));
        let keys: Vec<&str> = filter.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["city", "type"]);
    }
}
