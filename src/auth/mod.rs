//! Token issuance/verification and password hashing.
//!
//! Tokens are HS256-signed bearer tokens carrying the user identity and
//! role. Refresh succeeds only for tokens that are expired but otherwise
//! valid; live tokens and broken tokens are both rejected.

use crate::error::ApiError;
use crate::models::Role;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token lifetime.
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// JWT claims. `role` is required: a token without it fails verification
/// rather than degrading to a default role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Immutable signing material, initialized once at startup and injected
/// where needed.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for the user, valid for 24 hours.
    pub fn sign(&self, user_id: i64, email: &str, role: Role) -> Result<String, ApiError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(TOKEN_TTL_SECONDS);

        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::Auth("Invalid or expired token".into()))
    }

    /// Exchange an expired-but-otherwise-valid token for a fresh one.
    ///
    /// Returns the new token and its TTL in seconds. A still-valid token is
    /// rejected with "refresh not needed"; malformed or badly signed tokens
    /// are rejected outright.
    pub fn refresh(&self, token: &str) -> Result<(String, i64), ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(_) => {
                tracing::warn!("token refresh attempted on a still-valid token");
                Err(ApiError::Auth(
                    "Token is still valid, refresh not needed".into(),
                ))
            }
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    // Signature was fine; re-read the claims without the
                    // expiry check and reissue.
                    let mut lenient = Validation::new(Algorithm::HS256);
                    lenient.validate_exp = false;
                    let claims = decode::<Claims>(token, &self.decoding, &lenient)
                        .map(|data| data.claims)
                        .map_err(|_| ApiError::Auth("Invalid token".into()))?;

                    let new_token = self.sign(claims.user_id, &claims.email, claims.role)?;
                    tracing::info!(user_id = claims.user_id, "token refreshed");
                    Ok((new_token, TOKEN_TTL_SECONDS))
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    tracing::warn!("token refresh attempted with an invalid signature");
                    Err(ApiError::Auth("Invalid token signature".into()))
                }
                _ => Err(ApiError::Auth("Malformed token".into())),
            },
        }
    }
}

/// Hash a password with argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored argon2 hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new("test-secret")
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let keys = keys();
        let token = keys.sign(42, "user@example.com", Role::Mod).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.role, Role::Mod);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECONDS);
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = keys().sign(1, "a@b.io", Role::User).unwrap();
        let other = JwtKeys::new("different-secret");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(keys().verify("not.a.token").is_err());
        assert!(keys().verify("").is_err());
    }

    #[test]
    fn test_refresh_rejects_valid_token() {
        let keys = keys();
        let token = keys.sign(1, "a@b.io", Role::User).unwrap();
        assert!(keys.refresh(&token).is_err());
    }

    #[test]
    fn test_refresh_accepts_expired_token() {
        let keys = keys();

        // Hand-build an already-expired token with a valid signature.
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: 7,
            email: "late@example.com".to_string(),
            role: Role::User,
            iat: now - 2 * TOKEN_TTL_SECONDS,
            exp: now - TOKEN_TTL_SECONDS,
        };
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(keys.verify(&expired).is_err());

        let (new_token, ttl) = keys.refresh(&expired).unwrap();
        assert_eq!(ttl, TOKEN_TTL_SECONDS);

        let fresh = keys.verify(&new_token).unwrap();
        assert_eq!(fresh.user_id, 7);
        assert_eq!(fresh.email, "late@example.com");
    }

    #[test]
    fn test_refresh_rejects_bad_signature() {
        let other = JwtKeys::new("different-secret");
        let token = other.sign(1, "a@b.io", Role::User).unwrap();
        assert!(keys().refresh(&token).is_err());
    }

    #[test]
    fn test_token_without_role_is_rejected() {
        // Claims missing `role` entirely.
        #[derive(Serialize)]
        struct BareClaims {
            user_id: i64,
            email: String,
            iat: i64,
            exp: i64,
        }
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &BareClaims {
                user_id: 1,
                email: "a@b.io".to_string(),
                iat: now,
                exp: now + 600,
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("Pass1234!").unwrap();
        assert_ne!(hash, "Pass1234!");
        assert!(verify_password("Pass1234!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("Pass1234!", "not-a-hash"));
    }
}
