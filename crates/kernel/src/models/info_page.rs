//! Static informational pages: privacy policy, terms, about us.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Which page a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    Privacy,
    Terms,
    AboutUs,
}

impl InfoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoKind::Privacy => "privacy",
            InfoKind::Terms => "terms",
            InfoKind::AboutUs => "about-us",
        }
    }

    /// Human-readable title used in response messages.
    pub fn title(&self) -> &'static str {
        match self {
            InfoKind::Privacy => "Privacy policy",
            InfoKind::Terms => "Terms and conditions",
            InfoKind::AboutUs => "About us",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InfoPage {
    pub kind: String,
    pub content: String,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl InfoPage {
    pub async fn find(pool: &PgPool, kind: InfoKind) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, InfoPage>("SELECT * FROM info_pages WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_optional(pool)
            .await
            .context("failed to fetch info page")?;

        Ok(page)
    }

    /// Replace the page content, creating it on first write.
    pub async fn upsert(
        pool: &PgPool,
        kind: InfoKind,
        content: &str,
        updated_by: Uuid,
    ) -> Result<Self> {
        let page = sqlx::query_as::<_, InfoPage>(
            r#"
            INSERT INTO info_pages (kind, content, updated_by, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (kind)
            DO UPDATE SET content = EXCLUDED.content, updated_by = EXCLUDED.updated_by,
                          updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(kind.as_str())
        .bind(content)
        .bind(updated_by)
        .fetch_one(pool)
        .await
        .context("failed to save info page")?;

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_stored_keys() {
        assert_eq!(InfoKind::Privacy.as_str(), "privacy");
        assert_eq!(InfoKind::Terms.as_str(), "terms");
        assert_eq!(InfoKind::AboutUs.as_str(), "about-us");
    }

    #[test]
    fn page_serializes_camel_case() {
        let page = InfoPage {
            kind: "about-us".into(),
            content: "We list homes.".into(),
            updated_by: None,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["kind"], "about-us");
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("updatedBy").is_some());
    }
}
