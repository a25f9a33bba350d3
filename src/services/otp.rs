//! One-time codes for admin login.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;

use crate::auth::{issue_token, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::OtpStatus;
use crate::state::AppState;

pub const ADMIN_USER_ID: &str = "admin";

#[async_trait]
pub trait OtpDelivery: Send + Sync {
    async fn deliver(&self, email: &str, otp: &str) -> anyhow::Result<()>;
}

/// Writes the code to the log instead of sending mail.
pub struct LogOtpDelivery;

#[async_trait]
impl OtpDelivery for LogOtpDelivery {
    async fn deliver(&self, email: &str, otp: &str) -> anyhow::Result<()> {
        tracing::info!(email, otp, "admin OTP issued (log only)");
        Ok(())
    }
}

/// Eight decimal digits, never starting with zero.
pub fn generate_otp() -> String {
    rand::thread_rng()
        .gen_range(10_000_000..100_000_000u32)
        .to_string()
}

pub async fn send_admin_otp(state: &AppState) -> Result<(), AppError> {
    let otp = generate_otp();
    {
        let db = state.db.lock().unwrap();
        queries::save_admin_otp(&db, &otp)?;
    }

    state
        .otp_delivery
        .deliver(&state.config.admin_email, &otp)
        .await
        .map_err(AppError::Upstream)?;

    tracing::info!("admin OTP sent");
    Ok(())
}

/// Consumes a valid code and returns an admin bearer token.
pub fn verify_admin_otp(state: &AppState, otp: &str) -> Result<String, AppError> {
    let invalid = || AppError::Unauthorized("Invalid OTP".to_string());

    let db = state.db.lock().unwrap();
    let stored = queries::get_admin_otp(&db)?.ok_or_else(invalid)?;

    let expires_at = stored.updated_at + Duration::minutes(state.config.otp_ttl_minutes);
    if stored.status != OtpStatus::Active || stored.otp != otp || expires_at <= Utc::now().naive_utc() {
        tracing::warn!("rejected admin OTP");
        return Err(invalid());
    }

    if !queries::consume_admin_otp(&db, otp)? {
        return Err(invalid());
    }
    drop(db);

    let token = issue_token(
        ADMIN_USER_ID,
        &state.config.admin_email,
        "Admin",
        Role::Admin,
        &state.config.jwt,
    )?;

    tracing::info!("admin logged in with OTP");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_is_eight_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 8);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert!(!otp.starts_with('0'));
        }
    }
}
