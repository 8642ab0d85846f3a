//! Subscription plans and their entitlement limits.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::query::{FieldDef, FieldKind, Projection, ResourceSchema};

pub const PLAN_SCHEMA: ResourceSchema = ResourceSchema {
    table: "plans",
    fields: &[
        FieldDef::new("title", "title", FieldKind::Text),
        FieldDef::new("type", "type", FieldKind::Keyword),
        FieldDef::new("amount", "amount", FieldKind::Numeric).ranged(),
        FieldDef::new("rank", "rank", FieldKind::Numeric),
        FieldDef::new("isViewsContact", "is_views_contact", FieldKind::Boolean),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::AllColumns,
};

/// Billing period of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Weekly,
    Monthly,
    Yearly,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Weekly => "weekly",
            PlanType::Monthly => "monthly",
            PlanType::Yearly => "yearly",
        }
    }

    /// Subscription length granted by one purchase.
    pub fn days(&self) -> i32 {
        match self {
            PlanType::Weekly => 7,
            PlanType::Monthly => 30,
            PlanType::Yearly => 365,
        }
    }
}

/// Plan record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub created_by: Option<Uuid>,
    pub title: String,
    pub sub_title: String,
    pub description: String,
    pub features: Vec<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub plan_type: String,
    pub amount: f64,
    pub days: i32,
    pub property_image_credit: i32,
    pub property_video_credit: i32,
    pub boost_credit: i32,
    pub is_views_contact: bool,
    pub rank: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlan {
    pub title: String,
    #[serde(default)]
    pub sub_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub amount: f64,
    #[serde(default = "default_image_credit")]
    pub property_image_credit: i32,
    #[serde(default)]
    pub property_video_credit: i32,
    #[serde(default)]
    pub boost_credit: i32,
    #[serde(default)]
    pub is_views_contact: bool,
    #[serde(default = "default_rank")]
    pub rank: i32,
}

fn default_image_credit() -> i32 {
    1
}

fn default_rank() -> i32 {
    1
}

/// Input for updating a plan. Changing `type` recomputes `days`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlan {
    pub title: Option<String>,
    pub sub_title: Option<String>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub plan_type: Option<PlanType>,
    pub amount: Option<f64>,
    pub property_image_credit: Option<i32>,
    pub property_video_credit: Option<i32>,
    pub boost_credit: Option<i32>,
    pub is_views_contact: Option<bool>,
    pub rank: Option<i32>,
}

impl Plan {
    /// Find a plan that has not been deleted.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1 AND NOT is_deleted")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch plan by id")?;

        Ok(plan)
    }

    /// [`Plan::find_by_id`] inside an open transaction.
    pub async fn find_in(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>> {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1 AND NOT is_deleted")
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("failed to fetch plan by id")?;

        Ok(plan)
    }

    /// Create a plan.
    pub async fn create(pool: &PgPool, created_by: Uuid, input: CreatePlan) -> Result<Self> {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (id, created_by, title, sub_title, description, features, type,
                               amount, days, property_image_credit, property_video_credit,
                               boost_credit, is_views_contact, rank)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(created_by)
        .bind(input.title.trim())
        .bind(&input.sub_title)
        .bind(&input.description)
        .bind(&input.features)
        .bind(input.plan_type.as_str())
        .bind(input.amount)
        .bind(input.plan_type.days())
        .bind(input.property_image_credit)
        .bind(input.property_video_credit)
        .bind(input.boost_credit)
        .bind(input.is_views_contact)
        .bind(input.rank)
        .fetch_one(pool)
        .await
        .context("failed to create plan")?;

        Ok(plan)
    }

    /// Update a plan. Absent fields keep their current value.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdatePlan) -> Result<Option<Self>> {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            UPDATE plans SET
                title = COALESCE($2, title),
                sub_title = COALESCE($3, sub_title),
                description = COALESCE($4, description),
                features = COALESCE($5, features),
                type = COALESCE($6, type),
                days = COALESCE($7, days),
                amount = COALESCE($8, amount),
                property_image_credit = COALESCE($9, property_image_credit),
                property_video_credit = COALESCE($10, property_video_credit),
                boost_credit = COALESCE($11, boost_credit),
                is_views_contact = COALESCE($12, is_views_contact),
                rank = COALESCE($13, rank),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.sub_title)
        .bind(&input.description)
        .bind(&input.features)
        .bind(input.plan_type.map(|t| t.as_str()))
        .bind(input.plan_type.map(|t| t.days()))
        .bind(input.amount)
        .bind(input.property_image_credit)
        .bind(input.property_video_credit)
        .bind(input.boost_credit)
        .bind(input.is_views_contact)
        .bind(input.rank)
        .fetch_optional(pool)
        .await
        .context("failed to update plan")?;

        Ok(plan)
    }

    /// Soft-delete a plan. Returns `false` if it was already deleted.
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE plans SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete plan")?;

        Ok(result.rows_affected() > 0)
    }
}
