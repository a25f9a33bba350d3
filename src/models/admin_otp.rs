use chrono::NaiveDateTime;

/// The single admin login code. Only one row exists at a time.
#[derive(Debug, Clone)]
pub struct AdminOtp {
    pub otp: String,
    pub status: OtpStatus,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpStatus {
    Active,
    Used,
}

impl OtpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpStatus::Active => "active",
            OtpStatus::Used => "used",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => OtpStatus::Active,
            _ => OtpStatus::Used,
        }
    }
}
