//! Listing query builder using SeaQuery.
//!
//! Compiles a normalized [`Filter`] against a [`ResourceSchema`] into SQL:
//! - Range values become inclusive `>=` / `<=` bounds
//! - Boolean fields accept only `"true"` / `"false"`
//! - Text fields match case-insensitive substrings
//! - Keyword, numeric and reference fields match exactly
//! - Sets OR their members together
//!
//! Filter values are parsed once into [`Predicate`]s when the builder is
//! created; SeaQuery statements only exist inside [`ListingQueryBuilder::build`]
//! and [`ListingQueryBuilder::build_count`], so a builder can be held across
//! `.await`.
//!
//! Every query on a soft-deleting table is ANDed with `is_deleted = FALSE`.

use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr, Value,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::types::{
    FieldDef, FieldKind, Filter, FilterValue, PageRequest, Projection, ResourceSchema,
    SortDirection, SortKey,
};
use crate::error::AppError;

/// Column used when a request names no usable sort key.
const DEFAULT_SORT_COLUMN: &str = "created_at";

/// A filter value that does not fit its field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{field} must be a number, got \"{value}\"")]
    InvalidNumber { field: String, value: String },

    #[error("{field} must be true or false, got \"{value}\"")]
    InvalidBoolean { field: String, value: String },

    #[error("{field} must be a valid id, got \"{value}\"")]
    InvalidReference { field: String, value: String },

    #[error("{field} cannot be filtered")]
    NotFilterable { field: String },
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// One parsed condition on a column of the listed table.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(&'static str, Value),
    AtLeast(&'static str, Value),
    AtMost(&'static str, Value),
    OneOf(&'static str, Vec<Value>),
    /// Case-insensitive substring match against any of the needles.
    Contains(&'static str, Vec<String>),
    /// A flag that only counts while its expiry column is unset or in the future.
    Expiring {
        column: &'static str,
        expiry: &'static str,
        values: Vec<bool>,
    },
}

impl Predicate {
    fn to_condition(&self, table: &str) -> Cond {
        match self {
            Predicate::Equals(column, value) => {
                Cond::all().add(column_expr(table, column).eq(value.clone()))
            }
            Predicate::AtLeast(column, value) => {
                Cond::all().add(column_expr(table, column).gte(value.clone()))
            }
            Predicate::AtMost(column, value) => {
                Cond::all().add(column_expr(table, column).lte(value.clone()))
            }
            Predicate::OneOf(column, values) => {
                Cond::all().add(column_expr(table, column).is_in(values.iter().cloned()))
            }
            Predicate::Contains(column, needles) => needles
                .iter()
                .fold(Cond::any(), |cond, needle| {
                    cond.add(contains_ci(table, column, needle))
                }),
            Predicate::Expiring {
                column,
                expiry,
                values,
            } => values.iter().fold(Cond::any(), |cond, value| {
                let live = live_flag(table, column, expiry);
                cond.add(if *value { live } else { live.not() })
            }),
        }
    }
}

/// Query builder for resource listings.
#[derive(Debug, Clone)]
pub struct ListingQueryBuilder<'a> {
    schema: &'a ResourceSchema,
    predicates: Vec<Predicate>,
}

impl<'a> ListingQueryBuilder<'a> {
    /// Compile `filter` for `schema`.
    pub fn new(schema: &'a ResourceSchema, filter: &Filter) -> Result<Self, QueryError> {
        Ok(Self {
            schema,
            predicates: compile_filter(schema, filter)?,
        })
    }

    /// Restrict results to rows whose `column` equals `id`.
    pub fn scoped_to(self, column: &'static str, id: Uuid) -> Self {
        self.where_equals(column, id)
    }

    /// AND a fixed `column = value` condition.
    pub fn where_equals(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Equals(column, value.into()));
        self
    }

    /// Build the main SELECT query for one page.
    pub fn build(&self, page: &PageRequest) -> String {
        let mut query = Query::select();

        self.add_projection(&mut query);
        query.from(Alias::new(self.schema.table));
        query.cond_where(self.condition());

        for (column, order) in self.order_columns(&page.sort) {
            query.order_by((Alias::new(self.schema.table), Alias::new(column)), order);
        }

        query.limit(u64::from(page.limit));
        query.offset(page.offset());

        query.to_string(PostgresQueryBuilder)
    }

    /// Build a COUNT query over the same predicate, ignoring paging.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();

        query.expr(Expr::col(Asterisk).count());
        query.from(Alias::new(self.schema.table));
        query.cond_where(self.condition());

        query.to_string(PostgresQueryBuilder)
    }

    fn condition(&self) -> Cond {
        let table = self.schema.table;
        let mut cond = Cond::all();

        if self.schema.soft_delete {
            cond = cond.add(column_expr(table, "is_deleted").eq(false));
        }

        self.predicates
            .iter()
            .fold(cond, |cond, predicate| cond.add(predicate.to_condition(table)))
    }

    fn add_projection(&self, query: &mut SelectStatement) {
        let table = self.schema.table;

        match self.schema.projection {
            Projection::AllColumns => {
                query.column((Alias::new(table), Asterisk));
            }
            Projection::Columns { columns, embed } => {
                for column in columns {
                    query.column((Alias::new(table), Alias::new(*column)));
                }

                if let Some(embed) = embed {
                    query.join_as(
                        JoinType::LeftJoin,
                        Alias::new(embed.table),
                        Alias::new(embed.join_alias),
                        column_expr(table, embed.column)
                            .equals((Alias::new(embed.join_alias), Alias::new("id"))),
                    );

                    // Identifiers come from static schema declarations, never user input.
                    let pairs: Vec<String> = embed
                        .fields
                        .iter()
                        .map(|(key, column)| {
                            format!("'{key}', \"{}\".\"{column}\"", embed.join_alias)
                        })
                        .collect();
                    let object = format!(
                        "CASE WHEN \"{alias}\".\"id\" IS NULL THEN NULL ELSE json_build_object({}) END",
                        pairs.join(", "),
                        alias = embed.join_alias,
                    );
                    query.expr_as(Expr::cust(object), Alias::new(embed.alias));
                }
            }
        }
    }

    /// Resolve sort keys to columns. Unknown keys are skipped.
    fn order_columns(&self, sort: &[SortKey]) -> Vec<(&'static str, Order)> {
        let mut columns: Vec<(&'static str, Order)> = sort
            .iter()
            .filter_map(|key| {
                let Some(field) = self.schema.field(&key.field) else {
                    debug!(field = %key.field, table = self.schema.table, "ignoring unknown sort key");
                    return None;
                };
                let order = match key.direction {
                    SortDirection::Asc => Order::Asc,
                    SortDirection::Desc => Order::Desc,
                };
                Some((field.column, order))
            })
            .collect();

        if columns.is_empty() {
            columns.push((DEFAULT_SORT_COLUMN, Order::Desc));
        }

        // Stable paging across equal sort values.
        if !columns.iter().any(|(c, _)| *c == "id") {
            columns.push(("id", Order::Desc));
        }

        columns
    }
}

/// Parse a filter into predicates for `schema`.
fn compile_filter(
    schema: &ResourceSchema,
    filter: &Filter,
) -> Result<Vec<Predicate>, QueryError> {
    let mut predicates = Vec::new();

    for (key, value) in filter.iter() {
        let field = schema
            .field(key)
            .filter(|f| f.kind != FieldKind::Timestamp)
            .ok_or_else(|| QueryError::NotFilterable {
                field: key.to_string(),
            })?;

        predicates.extend(compile_field(field, value)?);
    }

    Ok(predicates)
}

/// Compile one field's filter value.
///
/// Ranges are checked first, then booleans, then the generic scalar/set rules.
fn compile_field(field: &FieldDef, value: &FilterValue) -> Result<Vec<Predicate>, QueryError> {
    let column = field.column;

    match value {
        FilterValue::Range { min, max } => {
            let mut bounds = Vec::new();
            if let Some(min) = min {
                bounds.push(Predicate::AtLeast(column, range_bound(field, min)?));
            }
            if let Some(max) = max {
                bounds.push(Predicate::AtMost(column, range_bound(field, max)?));
            }
            Ok(bounds)
        }
        FilterValue::Scalar(v) => Ok(vec![compile_values(field, std::slice::from_ref(v))?]),
        FilterValue::Set(vs) => Ok(vec![compile_values(field, vs)?]),
    }
}

/// One predicate matching any of `values`.
fn compile_values(field: &FieldDef, values: &[String]) -> Result<Predicate, QueryError> {
    let column = field.column;

    let parsed = match field.kind {
        FieldKind::Text => return Ok(Predicate::Contains(column, values.to_vec())),
        FieldKind::Boolean => {
            let flags = values
                .iter()
                .map(|v| parse_bool(field, v))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(expiry) = field.expiry {
                return Ok(Predicate::Expiring {
                    column,
                    expiry,
                    values: flags,
                });
            }
            flags.into_iter().map(Value::from).collect::<Vec<_>>()
        }
        FieldKind::Keyword => values.iter().map(|v| Value::from(v.clone())).collect(),
        FieldKind::Numeric => values
            .iter()
            .map(|v| parse_number(field, v).map(Value::from))
            .collect::<Result<Vec<_>, _>>()?,
        FieldKind::Reference => values
            .iter()
            .map(|v| parse_reference(field, v).map(Value::from))
            .collect::<Result<Vec<_>, _>>()?,
        FieldKind::Timestamp => {
            return Err(QueryError::NotFilterable {
                field: field.key.to_string(),
            });
        }
    };

    Ok(match <[Value; 1]>::try_from(parsed) {
        Ok([value]) => Predicate::Equals(column, value),
        Err(parsed) => Predicate::OneOf(column, parsed),
    })
}

/// Numeric bound for numeric fields, lexical bound otherwise.
fn range_bound(field: &FieldDef, value: &str) -> Result<Value, QueryError> {
    if field.kind == FieldKind::Numeric {
        Ok(parse_number(field, value)?.into())
    } else {
        Ok(value.to_string().into())
    }
}

/// `column = TRUE AND (expiry IS NULL OR expiry > CURRENT_TIMESTAMP)`.
fn live_flag(table: &str, column: &str, expiry: &str) -> Cond {
    Cond::all().add(column_expr(table, column).eq(true)).add(
        Cond::any()
            .add(column_expr(table, expiry).is_null())
            .add(column_expr(table, expiry).gt(Expr::current_timestamp())),
    )
}

/// `LOWER(col) LIKE '%value%'` with wildcards in `value` escaped.
fn contains_ci(table: &str, column: &str, value: &str) -> SimpleExpr {
    Expr::expr(Func::lower(column_expr(table, column))).like(format!(
        "%{}%",
        escape_like_wildcards(&value.to_lowercase())
    ))
}

fn column_expr(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

fn parse_number(field: &FieldDef, value: &str) -> Result<f64, QueryError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| QueryError::InvalidNumber {
            field: field.key.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(field: &FieldDef, value: &str) -> Result<bool, QueryError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(QueryError::InvalidBoolean {
            field: field.key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_reference(field: &FieldDef, value: &str) -> Result<Uuid, QueryError> {
    value
        .trim()
        .parse::<Uuid>()
        .map_err(|_| QueryError::InvalidReference {
            field: field.key.to_string(),
            value: value.to_string(),
        })
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::Embed;

    const FIELDS: &[FieldDef] = &[
        FieldDef::new("title", "title", FieldKind::Text),
        FieldDef::new("type", "type", FieldKind::Text),
        FieldDef::new("status", "status", FieldKind::Keyword),
        FieldDef::new("price", "price", FieldKind::Numeric).ranged(),
        FieldDef::new("bedrooms", "bedrooms", FieldKind::Numeric).ranged(),
        FieldDef::new("isBoosted", "is_boosted", FieldKind::Boolean),
        FieldDef::new("createdBy", "created_by", FieldKind::Reference),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ];

    const SCHEMA: ResourceSchema = ResourceSchema {
        table: "properties",
        fields: FIELDS,
        soft_delete: true,
        projection: Projection::AllColumns,
    };

    const EMBED_SCHEMA: ResourceSchema = ResourceSchema {
        table: "properties",
        fields: FIELDS,
        soft_delete: true,
        projection: Projection::Columns {
            columns: &["id", "title"],
            embed: Some(Embed {
                column: "created_by",
                table: "users",
                join_alias: "creator",
                alias: "created_by",
                fields: &[("id", "id"), ("fullName", "full_name")],
            }),
        },
    };

    fn page(page: u32, limit: u32) -> PageRequest {
        PageRequest {
            sort: vec![],
            page,
            limit,
        }
    }

    fn sql_for(filter: Filter) -> String {
        ListingQueryBuilder::new(&SCHEMA, &filter)
            .unwrap()
            .build(&page(1, 10))
    }

    #[test]
    fn soft_delete_is_always_applied() {
        let sql = sql_for(Filter::new());
        assert!(sql.contains("\"properties\".\"is_deleted\" = FALSE"), "{sql}");
    }

    #[test]
    fn range_compiles_to_inclusive_bounds() {
        let sql = sql_for(Filter::new().with(
            "price",
            FilterValue::Range {
                min: Some("100".into()),
                max: Some("500".into()),
            },
        ));
        assert!(sql.contains("\"properties\".\"price\" >= 100"), "{sql}");
        assert!(sql.contains("\"properties\".\"price\" <= 500"), "{sql}");
    }

    #[test]
    fn half_open_range_has_one_bound() {
        let sql = sql_for(Filter::new().with(
            "bedrooms",
            FilterValue::Range {
                min: None,
                max: Some("3".into()),
            },
        ));
        assert!(sql.contains("\"properties\".\"bedrooms\" <= 3"), "{sql}");
        assert!(!sql.contains(">="), "{sql}");
    }

    #[test]
    fn range_with_non_numeric_bound_is_rejected() {
        let filter = Filter::new().with(
            "price",
            FilterValue::Range {
                min: Some("cheap".into()),
                max: None,
            },
        );
        let err = ListingQueryBuilder::new(&SCHEMA, &filter).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidNumber {
                field: "price".into(),
                value: "cheap".into()
            }
        );
    }

    #[test]
    fn text_scalar_is_case_insensitive_substring() {
        let sql = sql_for(Filter::new().with("title", FilterValue::Scalar("Villa".into())));
        assert!(sql.contains("LOWER(\"properties\".\"title\")"), "{sql}");
        assert!(sql.contains("'%villa%'"), "{sql}");
    }

    #[test]
    fn text_set_ors_substring_matches() {
        let sql = sql_for(Filter::new().with(
            "type",
            FilterValue::Set(vec!["Buy".into(), "Rent".into()]),
        ));
        assert!(sql.contains("'%buy%'"), "{sql}");
        assert!(sql.contains("'%rent%'"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn keyword_set_is_membership() {
        let sql = sql_for(Filter::new().with(
            "status",
            FilterValue::Set(vec!["Available".into(), "Pending".into()]),
        ));
        assert!(
            sql.contains("\"properties\".\"status\" IN ('Available', 'Pending')"),
            "{sql}"
        );
    }

    #[test]
    fn numeric_scalar_is_equality() {
        let sql = sql_for(Filter::new().with("bedrooms", FilterValue::Scalar("3".into())));
        assert!(sql.contains("\"properties\".\"bedrooms\" = 3"), "{sql}");
    }

    #[test]
    fn numeric_scalar_rejects_text() {
        let filter = Filter::new().with("bedrooms", FilterValue::Scalar("three".into()));
        assert!(matches!(
            ListingQueryBuilder::new(&SCHEMA, &filter),
            Err(QueryError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn boolean_accepts_literal_strings() {
        let sql = sql_for(Filter::new().with("isBoosted", FilterValue::Scalar("true".into())));
        assert!(sql.contains("\"properties\".\"is_boosted\" = TRUE"), "{sql}");
    }

    #[test]
    fn boolean_rejects_other_values() {
        for value in ["1", "yes", "TRUE"] {
            let filter = Filter::new().with("isBoosted", FilterValue::Scalar(value.into()));
            assert!(
                matches!(
                    ListingQueryBuilder::new(&SCHEMA, &filter),
                    Err(QueryError::InvalidBoolean { .. })
                ),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn reference_parses_uuid() {
        let id = Uuid::now_v7();
        let sql = sql_for(Filter::new().with("createdBy", FilterValue::Scalar(id.to_string())));
        assert!(sql.contains(&id.to_string()), "{sql}");

        let filter = Filter::new().with("createdBy", FilterValue::Scalar("nope".into()));
        assert!(matches!(
            ListingQueryBuilder::new(&SCHEMA, &filter),
            Err(QueryError::InvalidReference { .. })
        ));
    }

    #[test]
    fn unknown_or_timestamp_fields_are_not_filterable() {
        for key in ["password", "createdAt"] {
            let filter = Filter::new().with(key, FilterValue::Scalar("x".into()));
            assert_eq!(
                ListingQueryBuilder::new(&SCHEMA, &filter).unwrap_err(),
                QueryError::NotFilterable { field: key.into() }
            );
        }
    }

    #[test]
    fn owner_scope_is_anded() {
        let owner = Uuid::now_v7();
        let sql = ListingQueryBuilder::new(&SCHEMA, &Filter::new())
            .unwrap()
            .scoped_to("created_by", owner)
            .build(&page(1, 10));
        assert!(sql.contains("\"properties\".\"created_by\" = "), "{sql}");
        assert!(sql.contains(&owner.to_string()), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
    }

    #[test]
    fn fixed_equality_is_anded() {
        let sql = ListingQueryBuilder::new(&SCHEMA, &Filter::new())
            .unwrap()
            .where_equals("status", "Available")
            .where_equals("is_boosted", false)
            .build_count();
        assert!(sql.contains("\"properties\".\"status\" = 'Available'"), "{sql}");
        assert!(sql.contains("\"properties\".\"is_boosted\" = FALSE"), "{sql}");
    }

    #[test]
    fn expiring_flag_checks_its_deadline() {
        const FLAGS: &[FieldDef] = &[FieldDef::new("isBoosted", "is_boosted", FieldKind::Boolean)
            .expires_with("boost_expiry")];
        const FLAG_SCHEMA: ResourceSchema = ResourceSchema {
            table: "properties",
            fields: FLAGS,
            soft_delete: false,
            projection: Projection::AllColumns,
        };

        let filter = Filter::new().with("isBoosted", FilterValue::Scalar("true".into()));
        let builder = ListingQueryBuilder::new(&FLAG_SCHEMA, &filter).unwrap();
        assert_eq!(
            builder.predicates,
            vec![Predicate::Expiring {
                column: "is_boosted",
                expiry: "boost_expiry",
                values: vec![true],
            }]
        );

        let sql = builder.build_count();
        assert!(sql.contains("\"properties\".\"is_boosted\" = TRUE"), "{sql}");
        assert!(sql.contains("\"properties\".\"boost_expiry\" IS NULL"), "{sql}");
        assert!(
            sql.contains("\"properties\".\"boost_expiry\" > CURRENT_TIMESTAMP"),
            "{sql}"
        );
        assert!(!sql.contains("NOT"), "{sql}");

        let filter = Filter::new().with("isBoosted", FilterValue::Scalar("false".into()));
        let sql = ListingQueryBuilder::new(&FLAG_SCHEMA, &filter)
            .unwrap()
            .build_count();
        assert!(sql.contains("NOT"), "{sql}");
    }

    #[test]
    fn pagination_offset() {
        let builder = ListingQueryBuilder::new(&SCHEMA, &Filter::new()).unwrap();

        let first = builder.build(&page(1, 10));
        assert!(first.contains("LIMIT 10"), "{first}");
        assert!(first.contains("OFFSET 0"), "{first}");

        let third = builder.build(&page(3, 10));
        assert!(third.contains("OFFSET 20"), "{third}");
    }

    #[test]
    fn default_sort_is_newest_first() {
        let sql = sql_for(Filter::new());
        assert!(
            sql.contains("ORDER BY \"properties\".\"created_at\" DESC, \"properties\".\"id\" DESC"),
            "{sql}"
        );
    }

    #[test]
    fn sort_keys_resolve_through_schema() {
        let builder = ListingQueryBuilder::new(&SCHEMA, &Filter::new()).unwrap();
        let req = PageRequest {
            sort: vec![
                SortKey::new("price", SortDirection::Asc),
                SortKey::new("bogus", SortDirection::Desc),
            ],
            page: 1,
            limit: 10,
        };
        let sql = builder.build(&req);
        assert!(sql.contains("ORDER BY \"properties\".\"price\" ASC"), "{sql}");
        assert!(!sql.contains("bogus"), "{sql}");
    }

    #[test]
    fn count_query_has_no_paging() {
        let builder = ListingQueryBuilder::new(
            &SCHEMA,
            &Filter::new().with("status", FilterValue::Scalar("Sold".into())),
        )
        .unwrap();
        let sql = builder.build_count();

        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(sql.contains("FROM \"properties\""), "{sql}");
        assert!(sql.contains("'Sold'"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn embed_joins_related_record() {
        let sql = ListingQueryBuilder::new(&EMBED_SCHEMA, &Filter::new())
            .unwrap()
            .build(&page(1, 10));
        assert!(sql.contains("LEFT JOIN \"users\" AS \"creator\""), "{sql}");
        assert!(sql.contains("json_build_object('id', \"creator\".\"id\""), "{sql}");
        assert!(sql.contains("AS \"created_by\""), "{sql}");
        assert!(!sql.contains("\"properties\".*"), "{sql}");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        let sql = sql_for(Filter::new().with("title", FilterValue::Scalar("100%_done".into())));
        assert!(
            !sql.contains("%100%_done%"),
            "raw wildcard chars should NOT appear unescaped: {sql}"
        );
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(super::escape_like_wildcards("hello"), "hello");
        assert_eq!(super::escape_like_wildcards("100%"), "100\\%");
        assert_eq!(super::escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(super::escape_like_wildcards("a\\b"), "a\\\\b");
    }
}
