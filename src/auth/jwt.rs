//! Bearer token issuance and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Role;

pub const DEFAULT_SECRET: &str = "changeme";

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            expiration_hours: 24,
            issuer: "ridebook".to_string(),
        }
    }
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            secret: std::env::var("JWT_SECRET").unwrap_or(defaults.secret),
            expiration_hours: std::env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.expiration_hours),
            issuer: defaults.issuer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the customer, driver or admin id.
    pub sub: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "userType")]
    pub user_type: Role,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: &str, email: &str, name: &str, role: Role, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours);

        Self {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            user_type: role,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

pub fn create_token(
    user_id: &str,
    email: &str,
    name: &str,
    role: Role,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, email, name, role, config);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, config: &JwtConfig) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify_token() {
        let config = JwtConfig::default();
        let token =
            create_token("cust-1", "alice@example.com", "Alice", Role::Customer, &config).unwrap();

        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "cust-1");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.user_type, Role::Customer);
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig {
            expiration_hours: -2,
            ..JwtConfig::default()
        };
        let token = create_token("d-1", "d@example.com", "D", Role::Driver, &config).unwrap();
        assert_eq!(verify_token(&token, &config).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let config = JwtConfig::default();
        let token = create_token("a", "a@example.com", "A", Role::Admin, &config).unwrap();

        let other = JwtConfig {
            secret: "another-secret".to_string(),
            ..JwtConfig::default()
        };
        assert_eq!(verify_token(&token, &other).unwrap_err(), TokenError::Invalid);
        assert_eq!(verify_token("garbage", &config).unwrap_err(), TokenError::Invalid);
    }
}
