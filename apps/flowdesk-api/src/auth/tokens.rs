//! HS256 bearer credentials shared by the REST surface and the gateway.
//!
//! One login issues one credential; both transports verify it with
//! [`verify_token`] against the same secret and claim shape.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::models::user::{Principal, Role};

/// Claims embedded in a bearer credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued-at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            name: claims.name,
            role: claims.role,
            email: claims.email,
        }
    }
}

/// Pull the credential out of an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify signature and expiry and return the identity the token carries.
pub fn verify_token(secret: &str, token: &str) -> Result<Principal, ChatError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(?e, "bearer token rejected");
        ChatError::AuthRejected
    })?;

    Ok(data.claims.into())
}

/// Sign a credential for `principal` valid for `ttl_secs`. Signing errors
/// are server faults and are passed through untouched.
pub fn mint_token(
    secret: &str,
    principal: &Principal,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        id: principal.id.clone(),
        role: principal.role,
        name: principal.name.clone(),
        email: principal.email.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn principal() -> Principal {
        Principal {
            id: "usr_1".to_string(),
            name: "Ana".to_string(),
            role: Role::Supervisor,
            email: Some("ana@example.com".to_string()),
        }
    }

    #[test]
    fn minted_token_round_trips_identity() {
        let token = mint_token(SECRET, &principal(), 3600).unwrap();
        let verified = verify_token(SECRET, &token).unwrap();
        assert_eq!(verified, principal());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_token(SECRET, &principal(), 3600).unwrap();
        assert!(matches!(
            verify_token("other-secret", &token),
            Err(ChatError::AuthRejected)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint_token(SECRET, &principal(), -600).unwrap();
        assert!(matches!(
            verify_token(SECRET, &token),
            Err(ChatError::AuthRejected)
        ));
    }

    #[test]
    fn signing_errors_are_not_client_errors() {
        let minted: Result<String, jsonwebtoken::errors::Error> =
            mint_token(SECRET, &principal(), 3600);
        assert!(minted.is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token(SECRET, "not-a-jwt").is_err());
    }

    #[test]
    fn legacy_reviewer_role_name_is_accepted() {
        let role: Role = serde_json::from_str("\"revisor\"").unwrap();
        assert_eq!(role, Role::Reviewer);
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
