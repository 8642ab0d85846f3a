//! Payment transactions recorded against subscription plans.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::query::{FieldDef, FieldKind, Projection, ResourceSchema};

pub const TRANSACTION_SCHEMA: ResourceSchema = ResourceSchema {
    table: "transactions",
    fields: &[
        FieldDef::new("type", "type", FieldKind::Keyword),
        FieldDef::new("status", "status", FieldKind::Keyword),
        FieldDef::new("user", "user_id", FieldKind::Reference),
        FieldDef::new("subscriptionId", "plan_id", FieldKind::Reference),
        FieldDef::new("transactionId", "reference", FieldKind::Text),
        FieldDef::new("amount", "amount", FieldKind::Numeric).ranged(),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::AllColumns,
};

/// Payment channel a transaction was made through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bkash,
    Nagad,
    Rocket,
    Surecash,
    Stripe,
    Paypal,
    Wise,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bkash => "bkash",
            PaymentMethod::Nagad => "nagad",
            PaymentMethod::Rocket => "rocket",
            PaymentMethod::Surecash => "surecash",
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Wise => "wise",
            PaymentMethod::Card => "card",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Canceled => "canceled",
        }
    }
}

/// Transaction record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "subscriptionId")]
    pub plan_id: Uuid,
    pub amount: f64,
    pub subscription_limitation: i32,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub method: String,
    pub screenshot: Option<String>,
    pub status: String,
    #[serde(rename = "transactionId")]
    pub reference: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A transaction about to be recorded.
///
/// Amount and limitation are copied from the plan at request time so later
/// plan edits do not rewrite history.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount: f64,
    pub subscription_limitation: i32,
    pub method: PaymentMethod,
    pub screenshot: Option<String>,
    pub reference: Option<String>,
}

/// Admin edits to a transaction's bookkeeping fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransaction {
    #[serde(rename = "type")]
    pub method: Option<PaymentMethod>,
    pub screenshot: Option<String>,
    #[serde(rename = "transactionId")]
    pub reference: Option<String>,
    pub amount: Option<f64>,
}

impl Transaction {
    pub fn status(&self) -> Option<TransactionStatus> {
        match self.status.as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "canceled" => Some(TransactionStatus::Canceled),
            _ => None,
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch transaction")?;

        Ok(transaction)
    }

    pub async fn create(pool: &PgPool, input: NewTransaction) -> Result<Self> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, user_id, plan_id, amount, subscription_limitation,
                                      type, screenshot, reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.user_id)
        .bind(input.plan_id)
        .bind(input.amount)
        .bind(input.subscription_limitation)
        .bind(input.method.as_str())
        .bind(&input.screenshot)
        .bind(&input.reference)
        .fetch_one(pool)
        .await
        .context("failed to create transaction")?;

        Ok(transaction)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        input: UpdateTransaction,
    ) -> Result<Option<Self>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET
                type = COALESCE($2, type),
                screenshot = COALESCE($3, screenshot),
                reference = COALESCE($4, reference),
                amount = COALESCE($5, amount),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.method.map(|m| m.as_str()))
        .bind(&input.screenshot)
        .bind(&input.reference)
        .bind(input.amount)
        .fetch_optional(pool)
        .await
        .context("failed to update transaction")?;

        Ok(transaction)
    }

    /// Move a pending transaction to `to`.
    ///
    /// Returns `None` if the transaction does not exist or was already
    /// settled, so two admins cannot both approve it.
    pub async fn settle(
        conn: &mut PgConnection,
        id: Uuid,
        to: TransactionStatus,
    ) -> Result<Option<Self>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions SET status = $2, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .fetch_optional(conn)
        .await
        .context("failed to settle transaction")?;

        Ok(transaction)
    }

    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete transaction")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_method_parses_lowercase() {
        let method: PaymentMethod = serde_json::from_str(r#""bkash""#).unwrap();
        assert_eq!(method, PaymentMethod::Bkash);
        assert!(serde_json::from_str::<PaymentMethod>(r#""cash""#).is_err());
    }

    #[test]
    fn update_uses_public_field_names() {
        let update: UpdateTransaction =
            serde_json::from_str(r#"{"type":"wise","transactionId":"TX-9"}"#).unwrap();
        assert_eq!(update.method, Some(PaymentMethod::Wise));
        assert_eq!(update.reference.as_deref(), Some("TX-9"));
    }

    #[test]
    fn reference_filter_is_text() {
        let field = TRANSACTION_SCHEMA.field("transactionId").unwrap();
        assert_eq!(field.column, "reference");
        assert_eq!(field.kind, FieldKind::Text);
    }
}
