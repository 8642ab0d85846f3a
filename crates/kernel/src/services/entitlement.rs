//! Subscription entitlements: image quota, contact visibility and boosts.
//!
//! The decisions are pure functions over a [`Subscription`] snapshot so they
//! can be tested without a database. Writes that spend an allowance are done
//! as conditional statements, so a concurrent request cannot push a user past
//! a limit between the check and the write.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Plan, Property, Role, User};

/// Images allowed on a listing without a subscription.
pub const FREE_IMAGE_LIMIT: i64 = 1;

/// Entitlement check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    #[error("{0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<EntitlementError> for AppError {
    fn from(e: EntitlementError) -> Self {
        match e {
            EntitlementError::QuotaExceeded(msg) => AppError::QuotaExceeded(msg),
            EntitlementError::Forbidden(msg) => AppError::Forbidden(msg),
            EntitlementError::BadRequest(msg) => AppError::BadRequest(msg),
            EntitlementError::NotFound(entity) => AppError::not_found(entity),
        }
    }
}

/// Subscription state as stored on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub plan_id: Option<Uuid>,
    pub taken: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub boost_credits: i32,
}

impl Subscription {
    pub fn of(user: &User) -> Self {
        Self {
            plan_id: user.subscription_id,
            taken: user.is_subscription_taken,
            expires_at: user.subscription_expires_at,
            boost_credits: user.boost_credits,
        }
    }

    /// The plan, if the user has taken a subscription.
    pub fn plan(&self) -> Option<Uuid> {
        self.plan_id.filter(|_| self.taken)
    }

    /// A subscription without an expiry counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at < now)
    }
}

/// Image limit for a listing owner: the free limit, or the plan's credit.
///
/// `plan` is the loaded subscription plan; `None` for a subscriber means the
/// plan has since been deleted.
pub fn image_limit(sub: &Subscription, plan: Option<&Plan>) -> Result<i64, EntitlementError> {
    if sub.plan().is_none() {
        return Ok(FREE_IMAGE_LIMIT);
    }
    plan.map(|p| i64::from(p.property_image_credit))
        .ok_or(EntitlementError::NotFound("Subscription plan"))
}

/// Allow adding `incoming` images to a listing that has `existing`.
pub fn check_image_quota(
    limit: i64,
    existing: usize,
    incoming: usize,
    subscribed: bool,
) -> Result<(), EntitlementError> {
    let total = (existing + incoming) as i64;
    if total <= limit {
        return Ok(());
    }
    Err(quota_exceeded(limit, subscribed))
}

/// Message for an exceeded image quota.
pub fn quota_exceeded(limit: i64, subscribed: bool) -> EntitlementError {
    if subscribed {
        EntitlementError::QuotaExceeded(format!(
            "Maximum {limit} images allowed by your subscription plan"
        ))
    } else {
        EntitlementError::QuotaExceeded(
            "Maximum 1 image allowed. Please take a subscription to upload more images."
                .to_string(),
        )
    }
}

/// Image allowance of a listing owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageAllowance {
    pub limit: i64,
    pub subscribed: bool,
}

impl ImageAllowance {
    pub fn check(&self, existing: usize, incoming: usize) -> Result<(), EntitlementError> {
        check_image_quota(self.limit, existing, incoming, self.subscribed)
    }

    pub fn exceeded(&self) -> EntitlementError {
        quota_exceeded(self.limit, self.subscribed)
    }
}

/// Load the image allowance of `owner_id` from their subscription plan.
pub async fn image_allowance(pool: &PgPool, owner_id: Uuid) -> Result<ImageAllowance, AppError> {
    let owner = User::find_active(pool, owner_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let sub = Subscription::of(&owner);

    let plan = match sub.plan() {
        Some(plan_id) => Plan::find_by_id(pool, plan_id).await?,
        None => None,
    };

    Ok(ImageAllowance {
        limit: image_limit(&sub, plan.as_ref())?,
        subscribed: sub.plan().is_some(),
    })
}

/// Outcome of the contact-list visibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactAccess {
    /// Admins see every contact.
    Unrestricted,
    /// Allowed if the plan grants contact views; scoped to the caller's listings.
    RequiresPlan(Uuid),
}

/// First stage of the contact visibility check, before the plan is loaded.
pub fn check_contact_access(
    role: Role,
    sub: &Subscription,
    now: DateTime<Utc>,
) -> Result<ContactAccess, EntitlementError> {
    if role.is_admin() {
        return Ok(ContactAccess::Unrestricted);
    }
    let Some(plan_id) = sub.plan() else {
        return Err(EntitlementError::Forbidden(
            "You need an active subscription to view contacts".to_string(),
        ));
    };
    if sub.is_expired(now) {
        return Err(EntitlementError::Forbidden(
            "Your subscription has expired".to_string(),
        ));
    }
    Ok(ContactAccess::RequiresPlan(plan_id))
}

/// Second stage: the loaded plan must grant contact views.
pub fn check_plan_views_contact(plan: Option<&Plan>) -> Result<(), EntitlementError> {
    let plan = plan.ok_or(EntitlementError::NotFound("Subscription plan"))?;
    if plan.is_views_contact {
        Ok(())
    } else {
        Err(EntitlementError::Forbidden(
            "Your subscription plan does not include viewing contacts".to_string(),
        ))
    }
}

/// Checks that need only the caller's subscription, before anything is loaded.
pub fn check_boost_eligibility(
    sub: &Subscription,
    now: DateTime<Utc>,
) -> Result<Uuid, EntitlementError> {
    let Some(plan_id) = sub.plan() else {
        return Err(EntitlementError::BadRequest(
            "You need an active subscription to boost a property".to_string(),
        ));
    };
    if sub.is_expired(now) {
        return Err(EntitlementError::BadRequest(
            "Your subscription has expired".to_string(),
        ));
    }
    if sub.boost_credits <= 0 {
        return Err(EntitlementError::BadRequest(
            "You have no boost credits left".to_string(),
        ));
    }
    Ok(plan_id)
}

/// Rank a boosted listing gets from its owner's plan.
pub fn boost_rank(plan: &Plan) -> i32 {
    if plan.rank > 0 { plan.rank } else { 1 }
}

/// Boost a property with one of the caller's credits.
///
/// Runs in one transaction: the caller's row is locked, the credit is spent
/// with a conditional decrement and the property is flagged only if it has
/// no running boost. A lapsed boost can be renewed. Either both writes commit or neither does.
pub async fn boost_property(
    pool: &PgPool,
    user_id: Uuid,
    property_id: Uuid,
) -> Result<Property, AppError> {
    let mut tx = pool.begin().await?;

    let user = User::lock_for_update(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let sub = Subscription::of(&user);
    let now = Utc::now();
    let plan_id = check_boost_eligibility(&sub, now)?;

    let plan = Plan::find_in(&mut tx, plan_id)
        .await?
        .ok_or(EntitlementError::NotFound("Subscription plan"))?;

    let property = Property::lock_for_update(&mut tx, property_id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    if property.is_boost_active(now) {
        return Err(AppError::BadRequest(
            "Property is already boosted".to_string(),
        ));
    }

    if !User::consume_boost_credit(&mut tx, user_id).await? {
        return Err(AppError::BadRequest(
            "You have no boost credits left".to_string(),
        ));
    }

    let boosted = Property::mark_boosted(&mut tx, property_id, boost_rank(&plan), sub.expires_at)
        .await?
        .ok_or_else(|| AppError::BadRequest("Property is already boosted".to_string()))?;

    tx.commit().await?;

    info!(
        user_id = %user_id,
        property_id = %property_id,
        rank = boosted.boosted_rank,
        "property boosted"
    );

    Ok(boosted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn plan(image_credit: i32, views_contact: bool, rank: i32) -> Plan {
        let now = Utc::now();
        Plan {
            id: Uuid::now_v7(),
            created_by: None,
            title: "Gold".into(),
            sub_title: String::new(),
            description: String::new(),
            features: vec![],
            plan_type: "monthly".into(),
            amount: 49.0,
            days: 30,
            property_image_credit: image_credit,
            property_video_credit: 0,
            boost_credit: 3,
            is_views_contact: views_contact,
            rank,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn unsubscribed() -> Subscription {
        Subscription {
            plan_id: None,
            taken: false,
            expires_at: None,
            boost_credits: 0,
        }
    }

    fn subscribed(expires_in_days: i64, credits: i32) -> Subscription {
        Subscription {
            plan_id: Some(Uuid::now_v7()),
            taken: true,
            expires_at: Some(Utc::now() + Duration::days(expires_in_days)),
            boost_credits: credits,
        }
    }

    #[test]
    fn free_users_get_one_image() {
        let limit = image_limit(&unsubscribed(), None).unwrap();
        assert_eq!(limit, 1);
        assert!(check_image_quota(limit, 0, 1, false).is_ok());

        let err = check_image_quota(limit, 1, 1, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Maximum 1 image allowed. Please take a subscription to upload more images."
        );
    }

    #[test]
    fn plan_credit_sets_the_limit() {
        let plan = plan(5, false, 1);
        let sub = subscribed(10, 0);
        let limit = image_limit(&sub, Some(&plan)).unwrap();
        assert_eq!(limit, 5);

        assert!(check_image_quota(limit, 4, 1, true).is_ok());
        let err = check_image_quota(limit, 4, 2, true).unwrap_err();
        assert_eq!(
            err,
            EntitlementError::QuotaExceeded(
                "Maximum 5 images allowed by your subscription plan".to_string()
            )
        );
    }

    #[test]
    fn missing_plan_is_not_found() {
        let err = image_limit(&subscribed(10, 0), None).unwrap_err();
        assert_eq!(err, EntitlementError::NotFound("Subscription plan"));
        assert_eq!(
            AppError::from(err).status(),
            axum::http::StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn plan_id_without_taken_flag_is_unsubscribed() {
        let mut sub = subscribed(10, 1);
        sub.taken = false;
        assert_eq!(sub.plan(), None);
        assert_eq!(image_limit(&sub, None).unwrap(), FREE_IMAGE_LIMIT);
    }

    #[test]
    fn allowance_checks_its_own_limit() {
        let allowance = ImageAllowance {
            limit: 3,
            subscribed: true,
        };
        assert!(allowance.check(2, 1).is_ok());
        assert_eq!(
            allowance.check(3, 1).unwrap_err(),
            allowance.exceeded()
        );
    }

    #[test]
    fn admins_see_all_contacts() {
        let access = check_contact_access(Role::Admin, &unsubscribed(), Utc::now()).unwrap();
        assert_eq!(access, ContactAccess::Unrestricted);
    }

    #[test]
    fn contact_access_requires_live_subscription() {
        let now = Utc::now();
        assert!(matches!(
            check_contact_access(Role::Agent, &unsubscribed(), now),
            Err(EntitlementError::Forbidden(_))
        ));
        assert!(matches!(
            check_contact_access(Role::Agent, &subscribed(-1, 0), now),
            Err(EntitlementError::Forbidden(_))
        ));

        let sub = subscribed(3, 0);
        assert_eq!(
            check_contact_access(Role::User, &sub, now).unwrap(),
            ContactAccess::RequiresPlan(sub.plan_id.unwrap())
        );
    }

    #[test]
    fn plan_must_grant_contact_views() {
        assert!(check_plan_views_contact(Some(&plan(1, true, 1))).is_ok());
        assert!(matches!(
            check_plan_views_contact(Some(&plan(1, false, 1))),
            Err(EntitlementError::Forbidden(_))
        ));
        assert_eq!(
            check_plan_views_contact(None),
            Err(EntitlementError::NotFound("Subscription plan"))
        );
    }

    #[test]
    fn boost_needs_credits() {
        let now = Utc::now();
        assert!(matches!(
            check_boost_eligibility(&subscribed(5, 0), now),
            Err(EntitlementError::BadRequest(_))
        ));
        assert!(matches!(
            check_boost_eligibility(&unsubscribed(), now),
            Err(EntitlementError::BadRequest(_))
        ));
        assert!(matches!(
            check_boost_eligibility(&subscribed(-2, 3), now),
            Err(EntitlementError::BadRequest(_))
        ));

        let sub = subscribed(5, 1);
        assert_eq!(check_boost_eligibility(&sub, now).unwrap(), sub.plan_id.unwrap());
    }

    #[test]
    fn boost_rank_defaults_to_one() {
        assert_eq!(boost_rank(&plan(1, false, 4)), 4);
        assert_eq!(boost_rank(&plan(1, false, 0)), 1);
    }
}
