//! User model and CRUD operations.

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::role::Role;
use crate::query::{FieldDef, FieldKind, Projection, ResourceSchema};

/// Avatar assigned to new accounts.
pub const DEFAULT_PROFILE_IMAGE: &str = "/uploads/users/user.png";

/// Admin user listing: all columns, password hash never serialized.
pub const USER_SCHEMA: ResourceSchema = ResourceSchema {
    table: "users",
    fields: &[
        FieldDef::new("fullName", "full_name", FieldKind::Text),
        FieldDef::new("email", "email", FieldKind::Text),
        FieldDef::new("role", "role", FieldKind::Keyword),
        FieldDef::new("isBlocked", "is_blocked", FieldKind::Boolean),
        FieldDef::new("subscriptionStatus", "subscription_status", FieldKind::Keyword),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::AllColumns,
};

/// Public agent directory: profile columns only.
pub const AGENT_SCHEMA: ResourceSchema = ResourceSchema {
    table: "users",
    fields: &[
        FieldDef::new("fullName", "full_name", FieldKind::Text),
        FieldDef::new("address", "address", FieldKind::Text),
        FieldDef::new("createdAt", "created_at", FieldKind::Timestamp),
    ],
    soft_delete: true,
    projection: Projection::Columns {
        columns: &[
            "id",
            "full_name",
            "email",
            "profile_image",
            "phone_number",
            "address",
            "created_at",
        ],
        embed: None,
    },
};

/// User record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub profile_image: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_blocked: bool,
    pub is_deleted: bool,
    pub subscription_id: Option<Uuid>,
    pub subscription_transaction_id: Option<Uuid>,
    #[serde(rename = "subscriptionExpirationDate")]
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub subscription_status: String,
    pub is_subscription_taken: bool,
    pub boost_credits: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile, as listed in the agent directory.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub profile_image: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

/// Input for updating a user's own profile.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
}

impl User {
    /// Parsed role. Unknown values are treated as the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    /// Find a user by ID, including deleted accounts.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Find an account that has not been deleted.
    pub async fn find_active(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND NOT is_deleted")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch active user")?;

        Ok(user)
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by email")?;

        Ok(user)
    }

    /// Lock the user row for the rest of the transaction.
    pub async fn lock_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("failed to lock user")?;

        Ok(user)
    }

    /// Create a new user.
    pub async fn create(pool: &PgPool, input: CreateUser) -> Result<Self> {
        let id = Uuid::now_v7();
        let password_hash = hash_password(&input.password)?;
        let first_name = input.first_name.trim();
        let last_name = input.last_name.trim();
        let full_name = format!("{first_name} {last_name}").trim().to_string();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, full_name, first_name, last_name, email, password_hash,
                               role, profile_image, phone_number, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&full_name)
        .bind(first_name)
        .bind(last_name)
        .bind(input.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(input.role.as_str())
        .bind(DEFAULT_PROFILE_IMAGE)
        .bind(&input.phone_number)
        .bind(&input.address)
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        Ok(user)
    }

    /// Create the bootstrap admin unless an account with `email` exists.
    ///
    /// Returns `true` if an account was created.
    pub async fn ensure_admin(pool: &PgPool, email: &str, password: &str) -> Result<bool> {
        if Self::find_by_email(pool, email).await?.is_some() {
            return Ok(false);
        }

        Self::create(
            pool,
            CreateUser {
                first_name: "Site".to_string(),
                last_name: "Admin".to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::Admin,
                phone_number: None,
                address: None,
            },
        )
        .await?;

        Ok(true)
    }

    /// Update profile fields. Absent fields keep their current value.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        input: UpdateProfile,
    ) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                full_name = TRIM(COALESCE($2, first_name) || ' ' || COALESCE($3, last_name)),
                phone_number = COALESCE($4, phone_number),
                address = COALESCE($5, address),
                profile_image = COALESCE($6, profile_image),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone_number)
        .bind(&input.address)
        .bind(&input.profile_image)
        .fetch_optional(pool)
        .await
        .context("failed to update user profile")?;

        Ok(user)
    }

    /// Start or renew a subscription from an approved transaction.
    ///
    /// Resets the boost allowance to the plan's credit.
    pub async fn activate_subscription(
        conn: &mut PgConnection,
        id: Uuid,
        plan_id: Uuid,
        transaction_id: Uuid,
        expires_at: DateTime<Utc>,
        boost_credits: i32,
    ) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                subscription_id = $2,
                subscription_transaction_id = $3,
                subscription_expires_at = $4,
                subscription_status = 'active',
                is_subscription_taken = TRUE,
                boost_credits = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(plan_id)
        .bind(transaction_id)
        .bind(expires_at)
        .bind(boost_credits.max(0))
        .fetch_optional(conn)
        .await
        .context("failed to activate subscription")?;

        Ok(user)
    }

    /// Spend one boost credit. Returns `false` when none are left.
    pub async fn consume_boost_credit(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET boost_credits = boost_credits - 1, updated_at = NOW() \
             WHERE id = $1 AND boost_credits > 0",
        )
        .bind(id)
        .execute(conn)
        .await
        .context("failed to consume boost credit")?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete an account. Returns `false` if it was already deleted.
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_hash(password_hash: String) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            full_name: "Rahim Uddin".into(),
            first_name: "Rahim".into(),
            last_name: "Uddin".into(),
            email: "rahim@example.com".into(),
            password_hash,
            role: "agent".into(),
            profile_image: DEFAULT_PROFILE_IMAGE.into(),
            phone_number: None,
            address: None,
            is_blocked: false,
            is_deleted: false,
            subscription_id: None,
            subscription_transaction_id: None,
            subscription_expires_at: None,
            subscription_status: "trialing".into(),
            is_subscription_taken: false,
            boost_credits: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_verifies() {
        let user = user_with_hash(hash_password("correct horse").unwrap());
        assert!(user.verify_password("correct horse"));
        assert!(!user.verify_password("wrong horse"));
    }

    #[test]
    fn empty_hash_never_verifies() {
        let user = user_with_hash(String::new());
        assert!(!user.verify_password(""));
    }

    #[test]
    fn serialization_hides_password_hash() {
        let user = user_with_hash("secret".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullName"], "Rahim Uddin");
        assert!(json.get("subscriptionExpirationDate").is_some());
    }

    #[test]
    fn unknown_role_is_least_privileged() {
        let mut user = user_with_hash(String::new());
        assert_eq!(user.role(), Role::Agent);
        user.role = "superuser".into();
        assert_eq!(user.role(), Role::User);
    }
}
