//! Side effects that follow a booking transition: a stored notification for
//! every affected party, plus a push to customers with a registered device.

pub mod fcm;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, Notification, NotificationKind};
use crate::state::AppState;

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Customer,
    Driver,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl Announcement {
    fn new(recipient: Recipient, kind: NotificationKind, title: &str, message: String) -> Self {
        Self {
            recipient,
            title: title.to_string(),
            message,
            kind,
        }
    }
}

/// What each party is told once a booking reaches its current status.
pub fn announcements_for(booking: &Booking) -> Vec<Announcement> {
    use NotificationKind::*;
    use Recipient::*;

    match booking.status {
        BookingStatus::Pending => vec![],
        BookingStatus::AwaitingAcceptance => vec![
            Announcement::new(
                Customer,
                System,
                "Ride quote ready",
                format!(
                    "Your ride has been quoted at {:.2}. Accept the quote to confirm it.",
                    booking.final_price.unwrap_or_default()
                ),
            ),
            Announcement::new(
                Driver,
                TaskAssigned,
                "New ride assigned",
                format!(
                    "You have been assigned to ride {}, pending customer acceptance.",
                    booking.id
                ),
            ),
        ],
        BookingStatus::Assigned => vec![
            Announcement::new(
                Customer,
                PaymentProcessed,
                "Payment received",
                "Your payment was received and your ride is confirmed.".to_string(),
            ),
            Announcement::new(
                Driver,
                TaskAssigned,
                "Ride confirmed",
                format!("The customer accepted ride {}.", booking.id),
            ),
        ],
        BookingStatus::HeadingToPickup => vec![Announcement::new(
            Customer,
            System,
            "Driver on the way",
            "Your driver is heading to the pickup location.".to_string(),
        )],
        BookingStatus::ArrivedAtPickup => vec![Announcement::new(
            Customer,
            System,
            "Driver has arrived",
            format!(
                "Your driver is waiting at {}.",
                booking.start_location.location_name
            ),
        )],
        BookingStatus::EnRoute => vec![Announcement::new(
            Customer,
            System,
            "Ride started",
            format!("You are on your way to {}.", booking.final_location.location_name),
        )],
        BookingStatus::Completed => vec![Announcement::new(
            Customer,
            System,
            "Ride completed",
            "Thanks for riding with us.".to_string(),
        )],
        BookingStatus::Cancelled => vec![Announcement::new(
            Driver,
            System,
            "Ride cancelled",
            format!("Ride {} was cancelled by the customer.", booking.id),
        )],
        BookingStatus::RejectedByAdmin => vec![Announcement::new(
            Customer,
            System,
            "Ride request rejected",
            format!(
                "Your ride request was rejected: {}",
                booking.rejection_reason.as_deref().unwrap_or("no reason given")
            ),
        )],
    }
}

pub fn create_notification(
    conn: &Connection,
    user_id: &str,
    title: &str,
    message: &str,
    kind: NotificationKind,
) -> anyhow::Result<Notification> {
    let notification = Notification {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        kind,
        read: false,
        created_at: Utc::now().naive_utc(),
    };
    queries::insert_notification(conn, &notification)?;
    Ok(notification)
}

struct Push {
    token: String,
    title: String,
    message: String,
}

/// Records and pushes the announcements for `booking`. Never fails: the
/// transition has already happened, so problems are only logged.
pub async fn announce_booking(state: &AppState, booking: &Booking) {
    let pushes = {
        let db = state.db.lock().unwrap();
        match record_announcements(&db, booking) {
            Ok(pushes) => pushes,
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, "failed to record notifications: {e:#}");
                return;
            }
        }
    };

    for push in pushes {
        if let Err(e) = state.push.send(&push.token, &push.title, &push.message).await {
            tracing::warn!(booking_id = %booking.id, "push delivery failed: {e:#}");
        }
    }
}

fn record_announcements(conn: &Connection, booking: &Booking) -> anyhow::Result<Vec<Push>> {
    let mut pushes = vec![];

    for announcement in announcements_for(booking) {
        let user_id = match announcement.recipient {
            Recipient::Customer => booking.customer_id.as_str(),
            Recipient::Driver => match booking.driver_id.as_deref() {
                Some(id) => id,
                None => continue,
            },
        };

        create_notification(
            conn,
            user_id,
            &announcement.title,
            &announcement.message,
            announcement.kind,
        )?;

        if announcement.recipient == Recipient::Customer {
            let token = queries::get_customer(conn, user_id)?.and_then(|c| c.fcm_token);
            if let Some(token) = token.filter(|t| !t.is_empty()) {
                pushes.push(Push {
                    token,
                    title: announcement.title,
                    message: announcement.message,
                });
            }
        }
    }

    Ok(pushes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn booking(status: BookingStatus, driver_id: Option<&str>) -> Booking {
        let now = Utc::now().naive_utc();
        let here = Location {
            longitude: 0.0,
            latitude: 0.0,
            location_name: "Station".to_string(),
        };
        Booking {
            id: "b-1".to_string(),
            customer_id: "c-1".to_string(),
            driver_id: driver_id.map(str::to_string),
            start_location: here.clone(),
            final_location: here,
            stops: vec![],
            number_of_passengers: 1,
            number_of_luggage: 0,
            note: None,
            contact_info: "555".to_string(),
            ride_time: now,
            final_price: Some(42.0),
            status,
            rejection_reason: Some("Outside service area".to_string()),
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_quote_notifies_both_parties() {
        let out = announcements_for(&booking(BookingStatus::AwaitingAcceptance, Some("d-1")));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].recipient, Recipient::Customer);
        assert!(out[0].message.contains("42.00"));
        assert_eq!(out[1].recipient, Recipient::Driver);
        assert_eq!(out[1].kind, NotificationKind::TaskAssigned);
    }

    #[test]
    fn test_acceptance_is_payment_processed_for_customer() {
        let out = announcements_for(&booking(BookingStatus::Assigned, Some("d-1")));
        assert_eq!(out[0].kind, NotificationKind::PaymentProcessed);
    }

    #[test]
    fn test_rejection_carries_reason() {
        let out = announcements_for(&booking(BookingStatus::RejectedByAdmin, None));
        assert_eq!(out.len(), 1);
        assert!(out[0].message.contains("Outside service area"));
    }

    #[test]
    fn test_cancel_without_driver_records_nothing() {
        let conn = crate::db::init_db(":memory:").unwrap();
        let pushes = record_announcements(&conn, &booking(BookingStatus::Cancelled, None)).unwrap();
        assert!(pushes.is_empty());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
