use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A geographic point with a human-readable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be between -180 and 180"))]
    pub longitude: f64,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(length(min = 1, message = "locationName is required"))]
    pub location_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub driver_id: Option<String>,
    pub start_location: Location,
    pub final_location: Location,
    pub stops: Vec<Location>,
    pub number_of_passengers: i64,
    pub number_of_luggage: i64,
    pub note: Option<String>,
    pub contact_info: String,
    pub ride_time: NaiveDateTime,
    pub final_price: Option<f64>,
    pub status: BookingStatus,
    pub rejection_reason: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Lifecycle of a ride request.
///
/// ```text
/// Pending ─admin─▶ AwaitingAcceptance ─customer─▶ Assigned ─driver─▶ HeadingToPickup
///    │                    │                                               │
///    ├─admin─▶ RejectedByAdmin                                            ▼
///    └─customer─┴─▶ Cancelled             Completed ◀─ EnRoute ◀─ ArrivedAtPickup
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "Awaiting-Acceptance")]
    AwaitingAcceptance,
    #[serde(rename = "Assigned")]
    Assigned,
    #[serde(rename = "Heading-To-Pickup")]
    HeadingToPickup,
    #[serde(rename = "Arrived-At-Pickup")]
    ArrivedAtPickup,
    #[serde(rename = "En-Route")]
    EnRoute,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "Rejected-By-Admin")]
    RejectedByAdmin,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Pending,
        BookingStatus::AwaitingAcceptance,
        BookingStatus::Assigned,
        BookingStatus::HeadingToPickup,
        BookingStatus::ArrivedAtPickup,
        BookingStatus::EnRoute,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::RejectedByAdmin,
    ];

    /// Statuses that make up a driver's current workload.
    pub const ACTIVE: [BookingStatus; 4] = [
        BookingStatus::Assigned,
        BookingStatus::HeadingToPickup,
        BookingStatus::ArrivedAtPickup,
        BookingStatus::EnRoute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::AwaitingAcceptance => "Awaiting-Acceptance",
            BookingStatus::Assigned => "Assigned",
            BookingStatus::HeadingToPickup => "Heading-To-Pickup",
            BookingStatus::ArrivedAtPickup => "Arrived-At-Pickup",
            BookingStatus::EnRoute => "En-Route",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::RejectedByAdmin => "Rejected-By-Admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// The statuses reachable from this one in a single step.
    pub fn allowed_next(&self) -> &'static [BookingStatus] {
        match self {
            BookingStatus::Pending => &[
                BookingStatus::AwaitingAcceptance,
                BookingStatus::Cancelled,
                BookingStatus::RejectedByAdmin,
            ],
            BookingStatus::AwaitingAcceptance => {
                &[BookingStatus::Assigned, BookingStatus::Cancelled]
            }
            BookingStatus::Assigned => &[BookingStatus::HeadingToPickup],
            BookingStatus::HeadingToPickup => &[BookingStatus::ArrivedAtPickup],
            BookingStatus::ArrivedAtPickup => &[BookingStatus::EnRoute],
            BookingStatus::EnRoute => &[BookingStatus::Completed],
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::RejectedByAdmin => {
                &[]
            }
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(BookingStatus::Cancelled)
    }

    /// Comma-separated successor list used in transition error messages.
    pub fn describe_next(&self) -> String {
        let next = self.allowed_next();
        if next.is_empty() {
            "none (final state)".to_string()
        } else {
            next.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown booking status: {s}"))
    }
}

/// Optional filters for booking listings. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub customer_id: Option<String>,
    pub driver_id: Option<String>,
}
