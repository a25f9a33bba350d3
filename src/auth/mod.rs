//! Identity and role gate.
//!
//! Resolves the bearer credential on a request into an [`Actor`] and checks
//! the actor's role. Ownership of individual bookings is not decided here;
//! the booking engine compares actor ids against the booking itself.

pub mod jwt;
pub mod password;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

use self::jwt::{create_token, verify_token, Claims, JwtConfig, TokenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated party behind a request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub user_type: Role,
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
            user_type: claims.user_type,
        }
    }
}

impl Actor {
    /// Passes if either the role or the user type is in `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) || allowed.contains(&self.user_type) {
            return Ok(());
        }

        let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
        Err(AppError::Forbidden(format!(
            "Access denied. Required roles: {}",
            names.join(", ")
        )))
    }
}

pub fn issue_token(
    user_id: &str,
    email: &str,
    name: &str,
    role: Role,
    config: &JwtConfig,
) -> Result<String, AppError> {
    create_token(user_id, email, name, role, config).map_err(|e| AppError::Internal(e.into()))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Access token is required".to_string()))?;

        let claims = verify_token(token, &state.config.jwt).map_err(|e| {
            if e == TokenError::Expired {
                tracing::debug!("rejected expired token");
            }
            AppError::Unauthorized(e.to_string())
        })?;

        Ok(Actor::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: "u-1".to_string(),
            email: "u@example.com".to_string(),
            name: "U".to_string(),
            role,
            user_type: role,
        }
    }

    #[test]
    fn test_require_role_allows_listed_role() {
        assert!(actor(Role::Driver).require_role(&[Role::Driver, Role::Admin]).is_ok());
    }

    #[test]
    fn test_require_role_rejects_other_roles() {
        let err = actor(Role::Customer).require_role(&[Role::Admin]).unwrap_err();
        match err {
            AppError::Forbidden(msg) => assert_eq!(msg, "Access denied. Required roles: admin"),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_require_role_accepts_user_type() {
        let mut a = actor(Role::Admin);
        a.user_type = Role::Driver;
        assert!(a.require_role(&[Role::Driver]).is_ok());
    }
}
