//! Access token signing and verification.

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};

/// JWT issuer claim value.
const ISSUER: &str = "realty";

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    /// User ID.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Issued token and its lifetime in seconds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// HS256 token service shared through `AppState`.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_seconds,
        }
    }

    /// Issue an access token for `user`.
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        self.issue_for(user.id, user.role())
    }

    fn issue_for(&self, user_id: Uuid, role: Role) -> Result<IssuedToken> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now + self.ttl_seconds,
            jti: Uuid::now_v7().to_string(),
        };

        let access_token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
                .context("failed to encode access token")?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.ttl_seconds,
        })
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .context("invalid token")?;

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-bytes-long!!";

    #[test]
    fn token_roundtrip() {
        let service = TokenService::new(SECRET, 3600);
        let user_id = Uuid::now_v7();

        let issued = service.issue_for(user_id, Role::Agent).unwrap();
        assert_eq!(issued.expires_in, 3600);

        let claims = service.verify(&issued.access_token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Agent);
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn other_secret_rejected() {
        let issued = TokenService::new(SECRET, 3600)
            .issue_for(Uuid::now_v7(), Role::User)
            .unwrap();
        let other = TokenService::new(b"another-secret-key-at-least-32-bytes!!!", 3600);
        assert!(other.verify(&issued.access_token).is_err());
    }

    #[test]
    fn wrong_issuer_rejected() {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: "wrong-issuer".to_string(),
            sub: Uuid::nil().to_string(),
            role: Role::Admin,
            iat: now,
            exp: now + 3600,
            jti: "jti".to_string(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(TokenService::new(SECRET, 3600).verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        // Past the default 60s leeway.
        let service = TokenService::new(SECRET, -120);
        let issued = service.issue_for(Uuid::now_v7(), Role::User).unwrap();
        assert!(service.verify(&issued.access_token).is_err());
    }

    #[test]
    fn garbage_rejected() {
        let service = TokenService::new(SECRET, 3600);
        assert!(service.verify("invalid.jwt.token").is_err());
    }
}
