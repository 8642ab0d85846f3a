//! Realty test utilities.
//!
//! Helpers for integration testing: request payload builders and
//! assertion utilities for the JSON response envelope.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Create a property payload with default values.
pub fn test_property(title: &str) -> TestProperty {
    TestProperty {
        title: title.to_string(),
        listing_type: "Buy".to_string(),
        category: "Apartment".to_string(),
        city: "Dhaka".to_string(),
        price: 120_000.0,
        area_sq_ft: Some(1_200.0),
        bedrooms: Some(3),
        images: vec!["listing-1.jpg".to_string()],
        features: vec![],
    }
}

/// A property payload builder for `POST /property/create`.
#[derive(Debug, Clone)]
pub struct TestProperty {
    pub title: String,
    pub listing_type: String,
    pub category: String,
    pub city: String,
    pub price: f64,
    pub area_sq_ft: Option<f64>,
    pub bedrooms: Option<i32>,
    pub images: Vec<String>,
    pub features: Vec<String>,
}

impl TestProperty {
    /// Set the deal type (`Buy`, `Rent`, `Lease`, `Auction`).
    pub fn with_type(mut self, listing_type: &str) -> Self {
        self.listing_type = listing_type.to_string();
        self
    }

    pub fn in_city(mut self, city: &str) -> Self {
        self.city = city.to_string();
        self
    }

    pub fn priced(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Replace the image list.
    pub fn with_images(mut self, images: &[&str]) -> Self {
        self.images = images.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a feature, which also marks the listing as featured.
    pub fn with_feature(mut self, feature: &str) -> Self {
        self.features.push(feature.to_string());
        self
    }

    /// Render the request body.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "title": self.title,
            "type": self.listing_type,
            "category": self.category,
            "city": self.city,
            "price": self.price,
            "areaSqFt": self.area_sq_ft,
            "bedrooms": self.bedrooms,
            "images": self.images,
            "features": self.features,
        })
    }
}

/// Create a registration payload with a unique email address.
pub fn test_user(role: &str) -> TestUser {
    TestUser {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("user-{}@example.com", Uuid::now_v7().simple()),
        password: "password123".to_string(),
        role: role.to_string(),
    }
}

/// A registration payload builder for `POST /auth/register`.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl TestUser {
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Render the registration body.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "firstName": self.first_name,
            "lastName": self.last_name,
            "email": self.email,
            "password": self.password,
            "role": self.role,
        })
    }

    /// Render the matching login body.
    pub fn login_json(&self) -> JsonValue {
        json!({
            "email": self.email,
            "password": self.password,
        })
    }
}

/// Create a general contact-us payload.
pub fn general_contact(message: &str) -> JsonValue {
    json!({
        "type": "general",
        "fullName": "Visitor",
        "email": "visitor@example.com",
        "message": message,
    })
}

/// Create a property inquiry payload.
pub fn property_inquiry(property_id: Uuid, message: &str) -> JsonValue {
    json!({
        "type": "property",
        "property": property_id.to_string(),
        "fullName": "Visitor",
        "email": "visitor@example.com",
        "message": message,
    })
}

/// Assertion helpers for the response envelope.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert the `{message, status, statusCode}` envelope carries `code`.
    pub fn status_code(body: &Value, code: u16) {
        has_key(body, "message");
        has_key(body, "status");
        assert_eq!(
            body["statusCode"].as_u64(),
            Some(u64::from(code)),
            "unexpected envelope: {body}"
        );
    }

    /// Assert that the envelope's message contains a substring.
    pub fn message_contains(body: &Value, needle: &str) {
        let message = body["message"].as_str().unwrap_or_default();
        assert!(
            message.contains(needle),
            "Expected message to contain '{needle}'\nActual: {message}"
        );
    }
}
