//! Contact-us messages and property inquiries.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::query::{FieldDef, FieldKind, Projection, ResourceSchema};

/// Contacts are kept forever, so there is no soft-delete flag.
pub const CONTACT_SCHEMA: ResourceSchema = ResourceSchema {
    table: "contacts",
    fields: &[
        FieldDef::new("fullName", "full_name", FieldKind::Text),
        FieldDef::new("email", "email", FieldKind::Text),
        FieldDef::new("phoneNumber", "phone_number", FieldKind::Text),
        FieldDef::new("address", "address", FieldKind::Text),
        FieldDef::new("type", "type", FieldKind::Keyword),
        FieldDef::new("property", "property_id", FieldKind::Reference),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: false,
    projection: Projection::AllColumns,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    General,
    Property,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::General => "general",
            ContactKind::Property => "property",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "user")]
    pub user_id: Option<Uuid>,
    #[serde(rename = "property")]
    pub property_id: Option<Uuid>,
    pub property_owner: Option<Uuid>,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact form submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    #[serde(rename = "type")]
    pub kind: ContactKind,
    #[serde(alias = "property")]
    pub property_id: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub message: Option<String>,
}

impl ContactForm {
    /// Display name: `fullName` if given, else first and last name joined.
    pub fn display_name(&self) -> String {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} {}", self.first_name.trim(), self.last_name.trim())
                .trim()
                .to_string(),
        }
    }
}

/// A validated contact ready to store.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub kind: ContactKind,
    pub user_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub property_owner: Option<Uuid>,
    pub form: ContactForm,
}

impl Contact {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch contact")?;

        Ok(contact)
    }

    pub async fn create(pool: &PgPool, input: NewContact) -> Result<Self> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (id, type, user_id, property_id, property_owner, full_name,
                                  first_name, last_name, email, phone_number, address, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.kind.as_str())
        .bind(input.user_id)
        .bind(input.property_id)
        .bind(input.property_owner)
        .bind(input.form.display_name())
        .bind(input.form.first_name.trim())
        .bind(input.form.last_name.trim())
        .bind(input.form.email.trim().to_lowercase())
        .bind(&input.form.phone_number)
        .bind(&input.form.address)
        .bind(&input.form.message)
        .fetch_one(pool)
        .await
        .context("failed to create contact")?;

        Ok(contact)
    }
}
