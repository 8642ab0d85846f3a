//! Property listings.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::query::{
    Embed, FieldDef, FieldKind, Filter, ListingQueryBuilder, PageRequest, Projection,
    ResourceSchema,
};

/// Columns safe to return from listing and detail reads.
const PUBLIC_COLUMNS: &[&str] = &[
    "id",
    "title",
    "description",
    "category",
    "type",
    "address",
    "city",
    "state",
    "zip_code",
    "country",
    "latitude",
    "longitude",
    "map_link",
    "price",
    "area_sq_ft",
    "lot_size",
    "year_built",
    "bedrooms",
    "bathrooms",
    "kitchen",
    "garage",
    "images",
    "videos",
    "features",
    "amenities",
    "other",
    "status",
    "views",
    "favorites",
    "inquiries",
    "is_featured",
    "is_boosted",
    "boosted_rank",
    "boost_expiry",
    "created_at",
    "updated_at",
];

/// Creator fields embedded as `createdBy`.
const CREATOR: Embed = Embed {
    column: "created_by",
    table: "users",
    join_alias: "creator",
    alias: "created_by",
    fields: &[
        ("id", "id"),
        ("fullName", "full_name"),
        ("email", "email"),
        ("profileImage", "profile_image"),
        ("subscriptionStatus", "subscription_status"),
        ("isSubscriptionTaken", "is_subscription_taken"),
        ("subscriptionExpirationDate", "subscription_expires_at"),
    ],
};

/// Property search schema.
pub const PROPERTY_SCHEMA: ResourceSchema = ResourceSchema {
    table: "properties",
    fields: &[
        FieldDef::new("title", "title", FieldKind::Text),
        FieldDef::new("type", "type", FieldKind::Text),
        FieldDef::new("category", "category", FieldKind::Text),
        FieldDef::new("address", "address", FieldKind::Text),
        FieldDef::new("city", "city", FieldKind::Text),
        FieldDef::new("state", "state", FieldKind::Text),
        FieldDef::new("country", "country", FieldKind::Text),
        FieldDef::new("zipCode", "zip_code", FieldKind::Text),
        FieldDef::new("status", "status", FieldKind::Text),
        FieldDef::new("price", "price", FieldKind::Numeric).ranged(),
        FieldDef::new("areaSqFt", "area_sq_ft", FieldKind::Numeric).ranged(),
        FieldDef::new("lotSize", "lot_size", FieldKind::Numeric).ranged(),
        FieldDef::new("bedrooms", "bedrooms", FieldKind::Numeric).ranged(),
        FieldDef::new("bathrooms", "bathrooms", FieldKind::Numeric).ranged(),
        FieldDef::new("yearBuilt", "year_built", FieldKind::Numeric).ranged(),
        FieldDef::new("garage", "garage", FieldKind::Numeric),
        FieldDef::new("kitchen", "kitchen", FieldKind::Numeric),
        FieldDef::new("isBoosted", "is_boosted", FieldKind::Boolean).expires_with("boost_expiry"),
        FieldDef::new("isFeatured", "is_featured", FieldKind::Boolean),
        FieldDef::new("boostedRank", "boosted_rank", FieldKind::Numeric),
        FieldDef::new("views", "views", FieldKind::Numeric),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
        FieldDef::new("updatedAt", "updated_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::Columns {
        columns: PUBLIC_COLUMNS,
        embed: Some(CREATOR),
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyCategory {
    House,
    Apartment,
    Condo,
    Land,
    Commercial,
    Other,
}

impl PropertyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyCategory::House => "House",
            PropertyCategory::Apartment => "Apartment",
            PropertyCategory::Condo => "Condo",
            PropertyCategory::Land => "Land",
            PropertyCategory::Commercial => "Commercial",
            PropertyCategory::Other => "Other",
        }
    }
}

/// Deal type offered by a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingType {
    Buy,
    Rent,
    Lease,
    Auction,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Buy => "Buy",
            ListingType::Rent => "Rent",
            ListingType::Lease => "Lease",
            ListingType::Auction => "Auction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    Available,
    Sold,
    Pending,
    Rented,
    #[serde(rename = "Off-Market")]
    OffMarket,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Available => "Available",
            PropertyStatus::Sold => "Sold",
            PropertyStatus::Pending => "Pending",
            PropertyStatus::Rented => "Rented",
            PropertyStatus::OffMarket => "Off-Market",
        }
    }
}

/// Full property record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub listing_type: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub map_link: Option<String>,
    pub price: f64,
    pub area_sq_ft: Option<f64>,
    pub lot_size: Option<f64>,
    pub year_built: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub kitchen: Option<i32>,
    pub garage: Option<i32>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub features: Vec<String>,
    pub amenities: Vec<String>,
    pub other: serde_json::Value,
    pub status: String,
    pub views: i32,
    pub favorites: i32,
    pub inquiries: i32,
    pub is_featured: bool,
    pub is_boosted: bool,
    pub boosted_rank: i32,
    pub boost_expiry: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Property as returned by search and detail reads, with its creator embedded.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub listing_type: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub map_link: Option<String>,
    pub price: f64,
    pub area_sq_ft: Option<f64>,
    pub lot_size: Option<f64>,
    pub year_built: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub kitchen: Option<i32>,
    pub garage: Option<i32>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub features: Vec<String>,
    pub amenities: Vec<String>,
    pub other: serde_json::Value,
    pub status: String,
    pub views: i32,
    pub favorites: i32,
    pub inquiries: i32,
    pub is_featured: bool,
    pub is_boosted: bool,
    pub boosted_rank: i32,
    pub boost_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<serde_json::Value>,
}

impl PropertyListing {
    /// Load one active property with its creator.
    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let sql = ListingQueryBuilder::new(&PROPERTY_SCHEMA, &Filter::new())
            .context("failed to compile property lookup")?
            .scoped_to("id", id)
            .build(&PageRequest::default());

        let listing = sqlx::query_as::<_, PropertyListing>(&sql)
            .fetch_optional(pool)
            .await
            .context("failed to fetch property listing")?;

        Ok(listing)
    }

    /// Price per square foot rounded to cents, when the area is known.
    pub fn price_per_sq_ft(&self) -> Option<f64> {
        price_per_sq_ft(self.price, self.area_sq_ft)
    }
}

fn price_per_sq_ft(price: f64, area: Option<f64>) -> Option<f64> {
    area.filter(|a| *a > 0.0)
        .map(|a| (price / a * 100.0).round() / 100.0)
}

fn boost_active(is_boosted: bool, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    is_boosted && expiry.is_none_or(|expiry| expiry > now)
}

/// Validated input for creating a property.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: PropertyCategory,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub map_link: Option<String>,
    pub price: f64,
    pub area_sq_ft: Option<f64>,
    pub lot_size: Option<f64>,
    pub year_built: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub kitchen: Option<i32>,
    pub garage: Option<i32>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default = "empty_object")]
    pub other: serde_json::Value,
    #[serde(default = "default_status")]
    pub status: PropertyStatus,
}

fn default_category() -> PropertyCategory {
    PropertyCategory::Other
}

fn default_status() -> PropertyStatus {
    PropertyStatus::Available
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

/// Property edits. Absent fields keep their current value.
///
/// Images are appended separately so they pass the image quota.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<PropertyCategory>,
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub map_link: Option<String>,
    pub price: Option<f64>,
    pub area_sq_ft: Option<f64>,
    pub lot_size: Option<f64>,
    pub year_built: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub kitchen: Option<i32>,
    pub garage: Option<i32>,
    pub videos: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub other: Option<serde_json::Value>,
    pub status: Option<PropertyStatus>,
}

impl Property {
    /// Find a property that has not been deleted.
    pub async fn find_active(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch property")?;

        Ok(property)
    }

    /// Lock an active property row for the rest of the transaction.
    pub async fn lock_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("failed to lock property")?;

        Ok(property)
    }

    /// Whether a boost is set and has not lapsed at `now`.
    pub fn is_boost_active(&self, now: DateTime<Utc>) -> bool {
        boost_active(self.is_boosted, self.boost_expiry, now)
    }

    /// Create a property owned by `owner`.
    pub async fn create(pool: &PgPool, owner: Uuid, input: NewProperty) -> Result<Self> {
        let is_featured = !input.features.is_empty();

        let property = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (
                id, created_by, title, description, category, type, address, city, state,
                zip_code, country, latitude, longitude, map_link, price, area_sq_ft, lot_size,
                year_built, bedrooms, bathrooms, kitchen, garage, images, videos, features,
                amenities, other, status, is_featured
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.category.as_str())
        .bind(input.listing_type.as_str())
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip_code)
        .bind(&input.country)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.map_link)
        .bind(input.price)
        .bind(input.area_sq_ft)
        .bind(input.lot_size)
        .bind(input.year_built)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(input.kitchen)
        .bind(input.garage)
        .bind(&input.images)
        .bind(&input.videos)
        .bind(&input.features)
        .bind(&input.amenities)
        .bind(&input.other)
        .bind(input.status.as_str())
        .bind(is_featured)
        .fetch_one(pool)
        .await
        .context("failed to create property")?;

        Ok(property)
    }

    /// Apply edits to an active property.
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        input: PropertyChanges,
    ) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                type = COALESCE($5, type),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                zip_code = COALESCE($9, zip_code),
                country = COALESCE($10, country),
                latitude = COALESCE($11, latitude),
                longitude = COALESCE($12, longitude),
                map_link = COALESCE($13, map_link),
                price = COALESCE($14, price),
                area_sq_ft = COALESCE($15, area_sq_ft),
                lot_size = COALESCE($16, lot_size),
                year_built = COALESCE($17, year_built),
                bedrooms = COALESCE($18, bedrooms),
                bathrooms = COALESCE($19, bathrooms),
                kitchen = COALESCE($20, kitchen),
                garage = COALESCE($21, garage),
                videos = COALESCE($22, videos),
                features = COALESCE($23, features),
                is_featured = COALESCE(cardinality($23) > 0, is_featured),
                amenities = COALESCE($24, amenities),
                other = COALESCE($25, other),
                status = COALESCE($26, status),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.category.map(|c| c.as_str()))
        .bind(input.listing_type.map(|t| t.as_str()))
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip_code)
        .bind(&input.country)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.map_link)
        .bind(input.price)
        .bind(input.area_sq_ft)
        .bind(input.lot_size)
        .bind(input.year_built)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(input.kitchen)
        .bind(input.garage)
        .bind(&input.videos)
        .bind(&input.features)
        .bind(&input.amenities)
        .bind(&input.other)
        .bind(input.status.map(|s| s.as_str()))
        .fetch_optional(conn)
        .await
        .context("failed to update property")?;

        Ok(property)
    }

    /// Append images only if the result stays within `limit`.
    ///
    /// Returns `None` when the property is gone or the limit would be exceeded;
    /// the check and the write are one statement.
    pub async fn append_images(
        conn: &mut PgConnection,
        id: Uuid,
        images: &[String],
        limit: i64,
    ) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET images = array_cat(images, $2), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted AND cardinality(images) + $3 <= $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(images)
        .bind(images.len() as i64)
        .bind(limit)
        .fetch_optional(conn)
        .await
        .context("failed to append property images")?;

        Ok(property)
    }

    /// Remove one image path. Returns `None` if the property lacks that image.
    pub async fn remove_image(pool: &PgPool, id: Uuid, image: &str) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET images = array_remove(images, $2), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted AND $2 = ANY(images)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(image)
        .fetch_optional(pool)
        .await
        .context("failed to remove property image")?;

        Ok(property)
    }

    /// Mark a property boosted unless a boost is still running.
    pub async fn mark_boosted(
        conn: &mut PgConnection,
        id: Uuid,
        rank: i32,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET is_boosted = TRUE, boosted_rank = $2, boost_expiry = $3, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
              AND NOT (is_boosted AND (boost_expiry IS NULL OR boost_expiry > NOW()))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(rank)
        .bind(expiry)
        .fetch_optional(conn)
        .await
        .context("failed to boost property")?;

        Ok(property)
    }

    /// Shift the favorites counter, never below zero.
    pub async fn adjust_favorites(conn: &mut PgConnection, id: Uuid, delta: i32) -> Result<()> {
        sqlx::query(
            "UPDATE properties SET favorites = GREATEST(favorites + $2, 0) WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(conn)
        .await
        .context("failed to update favorites counter")?;

        Ok(())
    }

    /// Count one more inquiry against a listing.
    pub async fn record_inquiry(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE properties SET inquiries = inquiries + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to update inquiries counter")?;

        Ok(())
    }

    /// Soft-delete a property. Returns `false` if it was already deleted.
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE properties SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete property")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_property_defaults() {
        let input: NewProperty = serde_json::from_str(
            r#"{"title":"Lake house","type":"Rent","price":1200,"images":["/uploads/propertys/a.png"]}"#,
        )
        .unwrap();
        assert_eq!(input.category, PropertyCategory::Other);
        assert_eq!(input.status, PropertyStatus::Available);
        assert_eq!(input.listing_type, ListingType::Rent);
        assert_eq!(input.other, serde_json::json!({}));
    }

    #[test]
    fn off_market_status_uses_hyphen() {
        let changes: PropertyChanges = serde_json::from_str(r#"{"status":"Off-Market"}"#).unwrap();
        assert_eq!(changes.status, Some(PropertyStatus::OffMarket));
        assert_eq!(PropertyStatus::OffMarket.as_str(), "Off-Market");
    }

    #[test]
    fn invalid_listing_type_is_rejected() {
        let result: Result<NewProperty, _> =
            serde_json::from_str(r#"{"title":"x","type":"Swap","price":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn price_per_square_foot() {
        assert_eq!(price_per_sq_ft(250_000.0, Some(1_500.0)), Some(166.67));
        assert_eq!(price_per_sq_ft(250_000.0, Some(0.0)), None);
        assert_eq!(price_per_sq_ft(250_000.0, None), None);
    }

    #[test]
    fn boost_lapses_at_expiry() {
        let now = Utc::now();
        let day = chrono::Duration::days(1);

        assert!(boost_active(true, Some(now + day), now));
        assert!(boost_active(true, None, now));
        assert!(!boost_active(true, Some(now - day), now));
        assert!(!boost_active(true, Some(now), now));
        assert!(!boost_active(false, Some(now + day), now));
    }

    #[test]
    fn boosted_filter_expires() {
        let field = PROPERTY_SCHEMA.field("isBoosted").unwrap();
        assert_eq!(field.expiry, Some("boost_expiry"));
    }

    #[test]
    fn schema_projects_safe_columns_only() {
        assert!(!PUBLIC_COLUMNS.contains(&"is_deleted"));
        assert!(!PUBLIC_COLUMNS.contains(&"created_by"));
        for key in ["price", "areaSqFt", "lotSize", "bedrooms", "bathrooms", "yearBuilt"] {
            assert!(
                PROPERTY_SCHEMA.field(key).is_some_and(|f| f.range),
                "{key} should accept ranges"
            );
        }
    }
}
