//! Filter normalization.
//!
//! Turns raw query-string pairs into a typed [`Filter`]: `min<Field>` /
//! `max<Field>` pairs become ranges, comma lists become sets, and empty
//! values are dropped. Only keys on the resource's allow-list survive.
//! Values are not type-checked here; the query builder rejects values that
//! do not fit their field.

use std::collections::HashMap;

use super::types::{Filter, FilterValue, ResourceSchema};

/// Query-string keys consumed by paging rather than filtering.
pub const PAGING_KEYS: [&str; 3] = ["sortBy", "page", "limit"];

/// Normalize raw query parameters against a resource schema.
pub fn normalize(params: &HashMap<String, String>, schema: &ResourceSchema) -> Filter {
    let mut filter = Filter::new();

    for field in schema.range_fields() {
        let suffix = capitalize(field.key);
        let min = non_empty(params.get(&format!("min{suffix}")));
        let max = non_empty(params.get(&format!("max{suffix}")));

        if min.is_some() || max.is_some() {
            filter.insert(field.key, FilterValue::Range { min, max });
        }
    }

    for (key, value) in params {
        if PAGING_KEYS.contains(&key.as_str()) || !schema.allows(key) {
            continue;
        }

        // A range on the same field wins over a plain value.
        if matches!(filter.get(key), Some(FilterValue::Range { .. })) {
            continue;
        }

        if let Some(value) = normalize_value(value) {
            filter.insert(key.clone(), value);
        }
    }

    filter
}

/// Classify one raw value as scalar or set. Returns `None` when nothing is left.
fn normalize_value(raw: &str) -> Option<FilterValue> {
    if raw.contains(',') {
        let items: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        return match items.len() {
            0 => None,
            _ => Some(FilterValue::Set(items)),
        };
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(FilterValue::Scalar(trimmed.to_string()))
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `areaSqFt` -> `AreaSqFt`
fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
