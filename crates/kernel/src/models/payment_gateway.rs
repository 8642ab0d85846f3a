//! Payment gateways shown at checkout.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::query::{FieldDef, FieldKind, Projection, ResourceSchema};

pub const GATEWAY_SCHEMA: ResourceSchema = ResourceSchema {
    table: "payment_gateways",
    fields: &[
        FieldDef::new("name", "name", FieldKind::Text),
        FieldDef::new("status", "status", FieldKind::Keyword),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::AllColumns,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Active,
    Inactive,
}

impl GatewayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayStatus::Active => "active",
            GatewayStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentGateway {
    pub id: Uuid,
    pub created_by: Option<Uuid>,
    pub name: String,
    pub logo: Option<String>,
    pub status: String,
    pub address: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGateway {
    pub name: String,
    pub logo: Option<String>,
    #[serde(default = "default_status")]
    pub status: GatewayStatus,
    pub address: Option<String>,
}

fn default_status() -> GatewayStatus {
    GatewayStatus::Active
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGateway {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub status: Option<GatewayStatus>,
    pub address: Option<String>,
}

impl PaymentGateway {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let gateway = sqlx::query_as::<_, PaymentGateway>(
            "SELECT * FROM payment_gateways WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch payment gateway")?;

        Ok(gateway)
    }

    pub async fn create(pool: &PgPool, created_by: Uuid, input: CreateGateway) -> Result<Self> {
        let gateway = sqlx::query_as::<_, PaymentGateway>(
            r#"
            INSERT INTO payment_gateways (id, created_by, name, logo, status, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(created_by)
        .bind(input.name.trim())
        .bind(&input.logo)
        .bind(input.status.as_str())
        .bind(&input.address)
        .fetch_one(pool)
        .await
        .context("failed to create payment gateway")?;

        Ok(gateway)
    }

    pub async fn update(pool: &PgPool, id: Uuid, input: UpdateGateway) -> Result<Option<Self>> {
        let gateway = sqlx::query_as::<_, PaymentGateway>(
            r#"
            UPDATE payment_gateways SET
                name = COALESCE($2, name),
                logo = COALESCE($3, logo),
                status = COALESCE($4, status),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.logo)
        .bind(input.status.map(|s| s.as_str()))
        .bind(&input.address)
        .fetch_optional(pool)
        .await
        .context("failed to update payment gateway")?;

        Ok(gateway)
    }

    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payment_gateways SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete payment gateway")?;

        Ok(result.rows_affected() > 0)
    }
}
