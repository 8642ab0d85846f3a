#![allow(clippy::unwrap_used, clippy::expect_used)]
//! HTTP surface tests that never reach the database.
//!
//! Every request here is rejected during authentication, role checks,
//! id parsing, body decoding or filter compilation, so the app runs over
//! a lazy pool that is never connected.
//!
//! ```bash
//! cargo test --test api_test
//! ```

use axum::http::StatusCode;
use realty_kernel::models::Role;
use realty_test_utils::{assert, test_user};
use serde_json::json;

mod common;
use common::TestApp;

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let app = TestApp::lazy();

    let (status, body) = app.get("/users/me", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::status_code(&body, 401);
}

#[tokio::test]
async fn invalid_token_is_rejected_even_on_public_routes() {
    let app = TestApp::lazy();

    let (status, body) = app.get("/property/all", Some("not.a.jwt")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::status_code(&body, 401);
}

#[tokio::test]
async fn token_from_another_secret_is_rejected() {
    let app = TestApp::lazy();
    let foreign = realty_kernel::services::token::TokenService::new(
        b"some-other-secret-some-other-secret!!",
        3600,
    );
    let token = foreign
        .issue(&common::detached_user(Role::Admin))
        .unwrap()
        .access_token;

    let (status, _) = app.get("/users", Some(&token)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_admin_registration_is_forbidden() {
    let app = TestApp::lazy();
    let user = test_user("admin");

    let (status, body) = app.post("/auth/register", None, &user.to_json()).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert::message_contains(&body, "admin");
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let app = TestApp::lazy();
    let user = test_user("user").with_password("letters-only");

    let (status, body) = app.post("/auth/register", None, &user.to_json()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "number");
}

#[tokio::test]
async fn malformed_email_is_rejected() {
    let app = TestApp::lazy();
    let user = test_user("agent").with_email("no-at-sign");

    let (status, body) = app.post("/auth/register", None, &user.to_json()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "email");
}

// =============================================================================
// Role checks
// =============================================================================

#[tokio::test]
async fn plan_creation_requires_admin() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::Agent);

    let (status, body) = app
        .post(
            "/subscriptions",
            Some(&token),
            &json!({"title": "Gold", "type": "monthly", "amount": 25.0}),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert::status_code(&body, 403);
}

#[tokio::test]
async fn user_listing_requires_admin() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::User);

    let (status, _) = app.get("/users", Some(&token)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn own_listings_require_agent_or_admin() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::User);

    let (status, _) = app.get("/property/selp/all", Some(&token)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn contact_detail_requires_agent_or_admin() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::User);

    let (status, _) = app
        .get("/contact/0190a0a0-0000-7000-8000-000000000000", Some(&token))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn info_pages_are_admin_write() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::Agent);

    for path in ["/info/privacy", "/info/terms", "/info/about-us"] {
        let (status, _) = app
            .post(path, Some(&token), &json!({"content": "Updated"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
async fn transaction_review_requires_admin() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::User);

    let (status, _) = app
        .post(
            "/subscriptions/approve",
            Some(&token),
            &json!({"transactionId": "0190a0a0-0000-7000-8000-000000000000"}),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Ids and bodies
// =============================================================================

#[tokio::test]
async fn malformed_property_id_is_a_bad_request() {
    let app = TestApp::lazy();

    let (status, body) = app.get("/property/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "Invalid property id");
}

#[tokio::test]
async fn malformed_favorite_id_is_a_bad_request() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::User);

    let (status, body) = app.delete("/info/favorite/42", Some(&token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "Invalid favorite id");
}

#[tokio::test]
async fn malformed_transaction_id_in_review_is_a_bad_request() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::Admin);

    let (status, body) = app
        .post(
            "/subscriptions/reject",
            Some(&token),
            &json!({"transactionId": "txn-123"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "Invalid transaction id");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::lazy();

    let (status, body) = app.post_raw("/auth/login", None, "{\"email\": ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::status_code(&body, 400);
}

#[tokio::test]
async fn negative_price_edit_is_a_bad_request() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::Agent);

    let (status, body) = app
        .patch(
            "/property/0190a0a0-0000-7000-8000-000000000000",
            Some(&token),
            &json!({"price": -5}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "price must not be negative");
}

#[tokio::test]
async fn contact_without_type_is_a_bad_request() {
    let app = TestApp::lazy();

    let (status, _) = app
        .post(
            "/contact",
            None,
            &json!({"fullName": "Visitor", "email": "v@example.com", "message": "Hello"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_payment_method_is_a_bad_request() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::User);

    let (status, _) = app
        .post(
            "/subscriptions/take",
            Some(&token),
            &json!({
                "subscriptionId": "0190a0a0-0000-7000-8000-000000000000",
                "type": "barter",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Listing filters
// =============================================================================

#[tokio::test]
async fn invalid_boolean_filter_is_a_bad_request() {
    let app = TestApp::lazy();

    let (status, body) = app.get("/property/all?isBoosted=maybe", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "isBoosted");
}

#[tokio::test]
async fn non_numeric_range_bound_is_a_bad_request() {
    let app = TestApp::lazy();

    let (status, body) = app.get("/property/all?minPrice=cheap", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "price");
}

#[tokio::test]
async fn invalid_reference_filter_is_a_bad_request() {
    let app = TestApp::lazy();
    let token = app.token_for(Role::Admin);

    let (status, body) = app.get("/transactions?user=someone", Some(&token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::message_contains(&body, "user");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::lazy();

    let (status, _) = app.get("/nowhere", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
