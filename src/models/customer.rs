use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub fcm_token: Option<String>,
    pub status: CustomerStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Unverified,
    Verified,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Unverified => "unverified",
            CustomerStatus::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "verified" => CustomerStatus::Verified,
            _ => CustomerStatus::Unverified,
        }
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(CustomerStatus::Unverified),
            "verified" => Ok(CustomerStatus::Verified),
            other => Err(format!("unknown customer status: {other}")),
        }
    }
}

/// Partial update applied by profile edits and admin updates.
#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub fcm_token: Option<String>,
    pub status: Option<CustomerStatus>,
}
