//! Saved properties.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::query::{Embed, FieldDef, FieldKind, Projection, ResourceSchema};

/// Favorites list for one user, each with a summary of its property.
pub const FAVORITE_SCHEMA: ResourceSchema = ResourceSchema {
    table: "favorites",
    fields: &[
        FieldDef::new("property", "property_id", FieldKind::Reference),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::Columns {
        columns: &["id", "created_at", "updated_at"],
        embed: Some(Embed {
            column: "property_id",
            table: "properties",
            join_alias: "saved",
            alias: "property",
            fields: &[
                ("id", "id"),
                ("title", "title"),
                ("type", "type"),
                ("category", "category"),
                ("price", "price"),
                ("address", "address"),
                ("city", "city"),
                ("images", "images"),
                ("status", "status"),
                ("isBoosted", "is_boosted"),
                ("isDeleted", "is_deleted"),
            ],
        }),
    },
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "property")]
    pub property_id: Uuid,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Favorite row as listed, with the property embedded.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteListing {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub property: Option<serde_json::Value>,
}

impl Favorite {
    /// Find one of `user_id`'s active favorites.
    pub async fn find_own(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Self>> {
        let favorite = sqlx::query_as::<_, Favorite>(
            "SELECT * FROM favorites WHERE id = $1 AND user_id = $2 AND NOT is_deleted",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch favorite")?;

        Ok(favorite)
    }

    /// Save a property. Returns `None` if it is already an active favorite.
    pub async fn create(
        conn: &mut PgConnection,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<Option<Self>> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (id, user_id, property_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, property_id) WHERE NOT is_deleted DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(property_id)
        .fetch_optional(conn)
        .await
        .context("failed to create favorite")?;

        Ok(favorite)
    }

    /// Point a favorite at another property.
    ///
    /// Returns `None` if the favorite is gone or the target is already saved.
    pub async fn repoint(
        conn: &mut PgConnection,
        id: Uuid,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<Option<Self>> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            UPDATE favorites SET property_id = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
              AND NOT EXISTS (
                  SELECT 1 FROM favorites
                  WHERE user_id = $2 AND property_id = $3 AND NOT is_deleted
              )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(property_id)
        .fetch_optional(conn)
        .await
        .context("failed to update favorite")?;

        Ok(favorite)
    }

    /// Soft-delete one of `user_id`'s favorites by id.
    pub async fn remove(conn: &mut PgConnection, id: Uuid, user_id: Uuid) -> Result<Option<Self>> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            UPDATE favorites SET is_deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .context("failed to delete favorite")?;

        Ok(favorite)
    }

    /// Soft-delete `user_id`'s favorite for a property.
    pub async fn remove_for_property(
        conn: &mut PgConnection,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<Option<Self>> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            UPDATE favorites SET is_deleted = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND property_id = $2 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_optional(conn)
        .await
        .context("failed to delete favorite")?;

        Ok(favorite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_embeds_the_property_summary() {
        let Projection::Columns { embed: Some(embed), .. } = FAVORITE_SCHEMA.projection else {
            panic!("favorites should embed their property");
        };
        assert_eq!(embed.column, "property_id");
        assert_eq!(embed.alias, "property");
        assert!(embed.fields.iter().any(|(key, _)| *key == "isDeleted"));
    }

    #[test]
    fn favorite_serializes_public_names() {
        let now = Utc::now();
        let favorite = Favorite {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            property_id: Uuid::now_v7(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&favorite).unwrap();
        assert_eq!(json["user"], favorite.user_id.to_string());
        assert_eq!(json["property"], favorite.property_id.to_string());
        assert_eq!(json["isDeleted"], false);
    }
}
