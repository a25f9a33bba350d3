use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub vehicle_details: VehicleDetails,
    pub status: DriverStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetails {
    #[validate(length(min = 1, message = "model is required"))]
    pub model: String,
    #[validate(length(min = 1, message = "licensePlate is required"))]
    pub license_plate: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    // Older clients send "on-trip"
    #[serde(alias = "on-trip")]
    OnTrip,
    Offline,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Available => "available",
            DriverStatus::OnTrip => "on_trip",
            DriverStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "available" => DriverStatus::Available,
            "on_trip" | "on-trip" => DriverStatus::OnTrip,
            _ => DriverStatus::Offline,
        }
    }
}

impl std::str::FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(DriverStatus::Available),
            "on_trip" | "on-trip" => Ok(DriverStatus::OnTrip),
            "offline" => Ok(DriverStatus::Offline),
            other => Err(format!("unknown driver status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DriverPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub vehicle_details: Option<VehicleDetails>,
    pub status: Option<DriverStatus>,
}
