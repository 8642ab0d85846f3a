//! Listing query engine.
//!
//! Turns list-endpoint query strings into paged SQL reads:
//! - `filter`: raw parameters to a typed [`Filter`]
//! - `query_builder`: [`Filter`] plus a [`ResourceSchema`] to SQL
//! - `pager`: sort/page/limit parsing and the count + slice reads

pub mod filter;
pub mod pager;
pub mod query_builder;
pub mod types;

use std::collections::HashMap;

use sqlx::PgPool;
use sqlx::postgres::PgRow;

use crate::error::AppResult;

pub use filter::normalize;
pub use pager::paginate;
pub use query_builder::{ListingQueryBuilder, QueryError};
pub use types::{
    Embed, FieldDef, FieldKind, Filter, FilterValue, Page, PageRequest, Projection,
    ResourceSchema, SortDirection, SortKey,
};

/// A listing request parsed from query-string parameters.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub filter: Filter,
    pub page: PageRequest,
}

impl ListingRequest {
    /// Split raw parameters into a normalized filter and paging options.
    pub fn from_params(params: &HashMap<String, String>, schema: &ResourceSchema) -> Self {
        Self {
            filter: normalize(params, schema),
            page: PageRequest::from_params(params),
        }
    }

    /// Compile the filter for `schema`.
    pub fn builder<'a>(&self, schema: &'a ResourceSchema) -> AppResult<ListingQueryBuilder<'a>> {
        Ok(ListingQueryBuilder::new(schema, &self.filter)?)
    }

    /// Compile and run the request with no extra scoping.
    pub async fn fetch<T>(&self, pool: &PgPool, schema: &ResourceSchema) -> AppResult<Page<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let builder = self.builder(schema)?;
        Ok(paginate(pool, &builder, &self.page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use crate::models::property::{PROPERTY_SCHEMA, PropertyListing};

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn listing_reads_can_move_between_threads() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let request = ListingRequest::from_params(&HashMap::new(), &PROPERTY_SCHEMA);
        let builder = request
            .builder(&PROPERTY_SCHEMA)
            .unwrap()
            .scoped_to("created_by", Uuid::nil());
        assert_send(&builder);

        let scoped = paginate::<PropertyListing>(&pool, &builder, &request.page);
        assert_send(&scoped);

        let unscoped = request.fetch::<PropertyListing>(&pool, &PROPERTY_SCHEMA);
        assert_send(&unscoped);
    }
}
