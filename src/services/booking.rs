//! Booking lifecycle engine.
//!
//! Every operation loads the booking, checks the actor's ownership, checks
//! the exact source status and only then writes. Writes are conditional on
//! the status that was checked, so a concurrent transition makes the second
//! writer fail instead of overwriting the first.

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use validator::Validate;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingFilter, BookingStatus, DriverStatus, Location, Payment};
use crate::services::notifications;
use crate::services::payments::{self, to_minor_units};
use crate::state::AppState;

pub const MAX_REJECTION_REASON_LEN: usize = 500;

/// A customer's ride request as accepted by the engine.
#[derive(Debug, Clone, Validate)]
pub struct RideRequest {
    #[validate(nested)]
    pub start_location: Location,
    #[validate(nested)]
    pub final_location: Location,
    #[validate(nested)]
    pub stops: Vec<Location>,
    #[validate(range(min = 1, message = "numberOfPassengers must be at least 1"))]
    pub number_of_passengers: i64,
    #[validate(range(min = 0, message = "numberOfLuggage cannot be negative"))]
    pub number_of_luggage: i64,
    pub note: Option<String>,
    #[validate(length(min = 1, message = "contactInfo is required"))]
    pub contact_info: String,
    pub ride_time: NaiveDateTime,
}

/// The driver-driven forward steps after a quote is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideStep {
    HeadToPickup,
    ArriveAtPickup,
    StartRide,
    Complete,
}

impl RideStep {
    pub fn from_status(&self) -> BookingStatus {
        match self {
            RideStep::HeadToPickup => BookingStatus::Assigned,
            RideStep::ArriveAtPickup => BookingStatus::HeadingToPickup,
            RideStep::StartRide => BookingStatus::ArrivedAtPickup,
            RideStep::Complete => BookingStatus::EnRoute,
        }
    }

    pub fn to_status(&self) -> BookingStatus {
        match self {
            RideStep::HeadToPickup => BookingStatus::HeadingToPickup,
            RideStep::ArriveAtPickup => BookingStatus::ArrivedAtPickup,
            RideStep::StartRide => BookingStatus::EnRoute,
            RideStep::Complete => BookingStatus::Completed,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            RideStep::HeadToPickup => "start heading to pickup",
            RideStep::ArriveAtPickup => "mark arrival at pickup",
            RideStep::StartRide => "start the ride",
            RideStep::Complete => "complete the ride",
        }
    }
}

fn load_booking(conn: &Connection, booking_id: &str) -> Result<Booking, AppError> {
    queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

fn require_owner(booking: &Booking, customer_id: &str) -> Result<(), AppError> {
    if booking.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "You can only manage your own bookings".to_string(),
        ));
    }
    Ok(())
}

fn require_assignee(booking: &Booking, driver_id: &str) -> Result<(), AppError> {
    if booking.driver_id.as_deref() != Some(driver_id) {
        return Err(AppError::Forbidden(
            "You are not assigned to this booking".to_string(),
        ));
    }
    Ok(())
}

fn require_status(booking: &Booking, expected: BookingStatus, action: &str) -> Result<(), AppError> {
    if booking.status != expected {
        return Err(AppError::BadRequest(format!(
            "Cannot {action}: booking is {}, expected {expected}. Allowed next status: {}",
            booking.status,
            booking.status.describe_next()
        )));
    }
    Ok(())
}

fn modified_concurrently() -> AppError {
    AppError::BadRequest("Booking was modified concurrently, please retry".to_string())
}

fn log_transition(booking_id: &str, from: BookingStatus, to: BookingStatus, actor_id: &str) {
    tracing::info!(
        booking_id,
        from = from.as_str(),
        to = to.as_str(),
        actor_id,
        "booking transitioned"
    );
}

pub fn submit_ride_request(
    conn: &Connection,
    customer_id: &str,
    request: RideRequest,
) -> Result<Booking, AppError> {
    if queries::get_customer(conn, customer_id)?.is_none() {
        return Err(AppError::NotFound("Customer not found".to_string()));
    }

    request.validate()?;

    let now = Utc::now().naive_utc();
    if request.ride_time <= now {
        return Err(AppError::BadRequest(
            "Ride time must be in the future".to_string(),
        ));
    }

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        driver_id: None,
        start_location: request.start_location,
        final_location: request.final_location,
        stops: request.stops,
        number_of_passengers: request.number_of_passengers,
        number_of_luggage: request.number_of_luggage,
        note: request.note,
        contact_info: request.contact_info,
        ride_time: request.ride_time,
        final_price: None,
        status: BookingStatus::Pending,
        rejection_reason: None,
        payment_id: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(conn, &booking)?;

    tracing::info!(booking_id = %booking.id, customer_id, "ride request submitted");
    Ok(booking)
}

/// Quotes a pending booking: claims the driver and sets the price together.
pub fn assign_driver_and_set_price(
    conn: &Connection,
    booking_id: &str,
    driver_id: &str,
    final_price: f64,
    admin_id: &str,
) -> Result<Booking, AppError> {
    let booking = load_booking(conn, booking_id)?;
    require_status(&booking, BookingStatus::Pending, "assign a driver")?;

    if !final_price.is_finite() || final_price <= 0.0 {
        return Err(AppError::BadRequest(
            "Final price must be greater than 0".to_string(),
        ));
    }

    let driver = queries::get_driver(conn, driver_id)?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;
    if driver.status != DriverStatus::Available {
        return Err(AppError::BadRequest("Driver is not available".to_string()));
    }

    let tx = conn.unchecked_transaction()?;
    if !queries::claim_driver(&tx, driver_id)? {
        return Err(AppError::BadRequest("Driver is not available".to_string()));
    }
    if !queries::assign_booking(&tx, booking_id, driver_id, final_price)? {
        return Err(modified_concurrently());
    }
    tx.commit()?;

    log_transition(booking_id, booking.status, BookingStatus::AwaitingAcceptance, admin_id);
    load_booking(conn, booking_id)
}

/// Checks that `customer_id` may accept the quote on `booking_id` right now.
pub fn check_quote_acceptable(
    conn: &Connection,
    booking_id: &str,
    customer_id: &str,
) -> Result<Booking, AppError> {
    let booking = load_booking(conn, booking_id)?;
    require_owner(&booking, customer_id)?;
    require_status(&booking, BookingStatus::AwaitingAcceptance, "accept the quote")?;
    Ok(booking)
}

/// Moves an awaiting booking to Assigned, linking a recorded payment.
pub fn accept_ride_quote(
    conn: &Connection,
    booking_id: &str,
    customer_id: &str,
    payment: &Payment,
) -> Result<Booking, AppError> {
    let booking = check_quote_acceptable(conn, booking_id, customer_id)?;

    if payment.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "Payment belongs to another customer".to_string(),
        ));
    }

    let price = booking.final_price.unwrap_or_default();
    if to_minor_units(payment.amount) < to_minor_units(price) {
        return Err(AppError::BadRequest(format!(
            "Payment amount {:.2} does not cover the quoted price {:.2}",
            payment.amount, price
        )));
    }

    if let Some(other) = queries::find_booking_by_payment(conn, &payment.id)? {
        if other.id != booking.id {
            return Err(AppError::BadRequest(
                "Payment has already been used for another booking".to_string(),
            ));
        }
    }

    if !queries::accept_booking(conn, booking_id, &payment.id)? {
        return Err(modified_concurrently());
    }

    log_transition(booking_id, booking.status, BookingStatus::Assigned, customer_id);
    load_booking(conn, booking_id)
}

/// Full accept flow: state check, provider verification, then the transition.
pub async fn accept_quote_with_payment(
    state: &AppState,
    booking_id: &str,
    customer_id: &str,
    payment_intent_id: &str,
) -> Result<Booking, AppError> {
    {
        let db = state.db.lock().unwrap();
        check_quote_acceptable(&db, booking_id, customer_id)?;
    }

    let payment = payments::verify_and_record_payment(state, payment_intent_id, customer_id).await?;

    let booking = {
        let db = state.db.lock().unwrap();
        accept_ride_quote(&db, booking_id, customer_id, &payment)?
    };

    notifications::announce_booking(state, &booking).await;
    Ok(booking)
}

pub fn cancel_booking(
    conn: &Connection,
    booking_id: &str,
    customer_id: &str,
) -> Result<Booking, AppError> {
    let booking = load_booking(conn, booking_id)?;
    require_owner(&booking, customer_id)?;

    if !booking.status.is_cancellable() {
        return Err(AppError::BadRequest(format!(
            "Cannot cancel booking: booking is {}, expected {} or {}. Allowed next status: {}",
            booking.status,
            BookingStatus::Pending,
            BookingStatus::AwaitingAcceptance,
            booking.status.describe_next()
        )));
    }

    let tx = conn.unchecked_transaction()?;
    if !queries::transition_booking(&tx, booking_id, booking.status, BookingStatus::Cancelled)? {
        return Err(modified_concurrently());
    }
    // A quoted driver was claimed at assignment and is no longer needed.
    if booking.status == BookingStatus::AwaitingAcceptance {
        if let Some(driver_id) = &booking.driver_id {
            queries::release_driver(&tx, driver_id)?;
        }
    }
    tx.commit()?;

    log_transition(booking_id, booking.status, BookingStatus::Cancelled, customer_id);
    load_booking(conn, booking_id)
}

pub fn reject_booking(
    conn: &Connection,
    booking_id: &str,
    reason: &str,
    admin_id: &str,
) -> Result<Booking, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest(
            "Rejection reason is required".to_string(),
        ));
    }
    if reason.chars().count() > MAX_REJECTION_REASON_LEN {
        return Err(AppError::BadRequest(format!(
            "Rejection reason must be at most {MAX_REJECTION_REASON_LEN} characters"
        )));
    }

    let booking = load_booking(conn, booking_id)?;
    require_status(&booking, BookingStatus::Pending, "reject the booking")?;

    if !queries::reject_booking(conn, booking_id, reason)? {
        return Err(modified_concurrently());
    }

    log_transition(booking_id, booking.status, BookingStatus::RejectedByAdmin, admin_id);
    load_booking(conn, booking_id)
}

/// Applies one driver step. Completing a ride releases the driver.
pub fn advance_ride(
    conn: &Connection,
    booking_id: &str,
    driver_id: &str,
    step: RideStep,
) -> Result<Booking, AppError> {
    let booking = load_booking(conn, booking_id)?;
    require_assignee(&booking, driver_id)?;

    let (from, to) = (step.from_status(), step.to_status());
    require_status(&booking, from, step.action())?;

    let tx = conn.unchecked_transaction()?;
    if !queries::transition_booking(&tx, booking_id, from, to)? {
        return Err(modified_concurrently());
    }
    if step == RideStep::Complete {
        queries::release_driver(&tx, driver_id)?;
    }
    tx.commit()?;

    log_transition(booking_id, from, to, driver_id);
    load_booking(conn, booking_id)
}

pub fn start_heading_to_pickup(conn: &Connection, booking_id: &str, driver_id: &str) -> Result<Booking, AppError> {
    advance_ride(conn, booking_id, driver_id, RideStep::HeadToPickup)
}

pub fn mark_arrived_at_pickup(conn: &Connection, booking_id: &str, driver_id: &str) -> Result<Booking, AppError> {
    advance_ride(conn, booking_id, driver_id, RideStep::ArriveAtPickup)
}

pub fn start_ride(conn: &Connection, booking_id: &str, driver_id: &str) -> Result<Booking, AppError> {
    advance_ride(conn, booking_id, driver_id, RideStep::StartRide)
}

pub fn complete_ride(conn: &Connection, booking_id: &str, driver_id: &str) -> Result<Booking, AppError> {
    advance_ride(conn, booking_id, driver_id, RideStep::Complete)
}

/// Statuses in which a booking holds its driver's claim.
const CLAIMING: [BookingStatus; 5] = [
    BookingStatus::AwaitingAcceptance,
    BookingStatus::Assigned,
    BookingStatus::HeadingToPickup,
    BookingStatus::ArrivedAtPickup,
    BookingStatus::EnRoute,
];

/// Refuses a manual status change for a driver held by a quoted or active
/// booking. Their status is released by the lifecycle, not by edits.
pub fn ensure_driver_status_editable(
    conn: &Connection,
    driver_id: &str,
    status: DriverStatus,
) -> Result<(), AppError> {
    let driver = queries::get_driver(conn, driver_id)?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;
    if driver.status == status {
        return Ok(());
    }

    let held = queries::list_driver_bookings_in(conn, driver_id, &CLAIMING)?;
    if let Some(booking) = held.first() {
        return Err(AppError::BadRequest(format!(
            "Driver status cannot be changed while booking {} is {}",
            booking.id, booking.status
        )));
    }
    Ok(())
}

/// The driver's current workload: bookings in an active status only.
pub fn fetch_assigned_rides(conn: &Connection, driver_id: &str) -> Result<Vec<Booking>, AppError> {
    if queries::get_driver(conn, driver_id)?.is_none() {
        return Err(AppError::NotFound("Driver not found".to_string()));
    }
    Ok(queries::list_driver_bookings_in(conn, driver_id, &BookingStatus::ACTIVE)?)
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
    Ok(queries::list_bookings(conn, filter)?)
}

pub fn get_booking(conn: &Connection, booking_id: &str) -> Result<Booking, AppError> {
    load_booking(conn, booking_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::{Customer, CustomerStatus, Driver, VehicleDetails};
    use chrono::Duration;

    fn setup() -> Connection {
        let conn = init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();
        for id in ["c-1", "c-2"] {
            queries::insert_customer(
                &conn,
                &Customer {
                    id: id.to_string(),
                    name: id.to_string(),
                    email: format!("{id}@example.com"),
                    phone_number: None,
                    password_hash: "x".to_string(),
                    fcm_token: None,
                    status: CustomerStatus::Verified,
                    created_at: now,
                    updated_at: now,
                },
            )
            .unwrap();
        }
        for (id, status) in [("d-1", DriverStatus::Available), ("d-2", DriverStatus::Offline)] {
            queries::insert_driver(
                &conn,
                &Driver {
                    id: id.to_string(),
                    name: id.to_string(),
                    email: format!("{id}@example.com"),
                    password_hash: "x".to_string(),
                    vehicle_details: VehicleDetails {
                        model: "Van".to_string(),
                        license_plate: "XY-1".to_string(),
                    },
                    status,
                    created_at: now,
                    updated_at: now,
                },
            )
            .unwrap();
        }
        conn
    }

    fn location(name: &str) -> Location {
        Location {
            longitude: 13.4,
            latitude: 52.5,
            location_name: name.to_string(),
        }
    }

    fn request() -> RideRequest {
        RideRequest {
            start_location: location("Airport"),
            final_location: location("Hotel"),
            stops: vec![],
            number_of_passengers: 2,
            number_of_luggage: 1,
            note: None,
            contact_info: "555-0100".to_string(),
            ride_time: Utc::now().naive_utc() + Duration::hours(3),
        }
    }

    fn payment(customer_id: &str, amount: f64) -> Payment {
        let now = Utc::now().naive_utc();
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            payment_intent_id: format!("pi_{}", uuid::Uuid::new_v4().simple()),
            amount,
            currency: "USD".to_string(),
            payment_method: None,
            stripe_charge_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn quoted(conn: &Connection) -> Booking {
        let b = submit_ride_request(conn, "c-1", request()).unwrap();
        assign_driver_and_set_price(conn, &b.id, "d-1", 40.0, "admin").unwrap()
    }

    fn assigned(conn: &Connection) -> Booking {
        let b = quoted(conn);
        let p = payment("c-1", 40.0);
        queries::insert_payment(conn, &p).unwrap();
        accept_ride_quote(conn, &b.id, "c-1", &p).unwrap()
    }

    fn driver_status(conn: &Connection, id: &str) -> DriverStatus {
        queries::get_driver(conn, id).unwrap().unwrap().status
    }

    fn bad_request_message(err: AppError) -> String {
        match err {
            AppError::BadRequest(msg) => msg,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_submit_creates_pending_booking() {
        let conn = setup();
        let b = submit_ride_request(&conn, "c-1", request()).unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(b.driver_id.is_none());
        assert!(b.final_price.is_none());
        assert_eq!(get_booking(&conn, &b.id).unwrap().contact_info, "555-0100");
    }

    #[test]
    fn test_submit_rejects_past_ride_time() {
        let conn = setup();
        let mut req = request();
        req.ride_time = Utc::now().naive_utc() - Duration::hours(1);

        let msg = bad_request_message(submit_ride_request(&conn, "c-1", req).unwrap_err());
        assert_eq!(msg, "Ride time must be in the future");
    }

    #[test]
    fn test_submit_rejects_bad_stop_and_unknown_customer() {
        let conn = setup();
        let mut req = request();
        req.stops.push(Location {
            longitude: 200.0,
            latitude: 0.0,
            location_name: "Nowhere".to_string(),
        });
        let msg = bad_request_message(submit_ride_request(&conn, "c-1", req).unwrap_err());
        assert!(msg.contains("longitude"), "{msg}");

        assert!(matches!(
            submit_ride_request(&conn, "ghost", request()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_assign_claims_driver_and_sets_quote() {
        let conn = setup();
        let b = quoted(&conn);
        assert_eq!(b.status, BookingStatus::AwaitingAcceptance);
        assert_eq!(b.driver_id.as_deref(), Some("d-1"));
        assert_eq!(b.final_price, Some(40.0));
        assert_eq!(driver_status(&conn, "d-1"), DriverStatus::OnTrip);
    }

    #[test]
    fn test_assign_unavailable_driver_leaves_booking_pending() {
        let conn = setup();
        let b = submit_ride_request(&conn, "c-1", request()).unwrap();

        let msg = bad_request_message(
            assign_driver_and_set_price(&conn, &b.id, "d-2", 40.0, "admin").unwrap_err(),
        );
        assert_eq!(msg, "Driver is not available");
        assert_eq!(get_booking(&conn, &b.id).unwrap().status, BookingStatus::Pending);
    }

    #[test]
    fn test_driver_cannot_be_double_booked() {
        let conn = setup();
        quoted(&conn);
        let second = submit_ride_request(&conn, "c-2", request()).unwrap();

        let err = assign_driver_and_set_price(&conn, &second.id, "d-1", 30.0, "admin").unwrap_err();
        assert_eq!(bad_request_message(err), "Driver is not available");
    }

    #[test]
    fn test_assign_rejects_bad_price_and_unknown_driver() {
        let conn = setup();
        let b = submit_ride_request(&conn, "c-1", request()).unwrap();

        for price in [0.0, -5.0, f64::NAN] {
            let err = assign_driver_and_set_price(&conn, &b.id, "d-1", price, "admin").unwrap_err();
            assert_eq!(bad_request_message(err), "Final price must be greater than 0");
        }
        assert!(matches!(
            assign_driver_and_set_price(&conn, &b.id, "ghost", 10.0, "admin"),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(driver_status(&conn, "d-1"), DriverStatus::Available);
    }

    #[test]
    fn test_assign_on_assigned_booking_names_pending() {
        let conn = setup();
        let b = assigned(&conn);

        let msg = bad_request_message(
            assign_driver_and_set_price(&conn, &b.id, "d-1", 40.0, "admin").unwrap_err(),
        );
        assert!(msg.contains("expected Pending"), "{msg}");
        assert!(msg.contains("Heading-To-Pickup"), "{msg}");
    }

    #[test]
    fn test_accept_links_payment() {
        let conn = setup();
        let b = assigned(&conn);
        assert_eq!(b.status, BookingStatus::Assigned);
        assert!(b.payment_id.is_some());
    }

    #[test]
    fn test_accept_checks_owner_amount_and_reuse() {
        let conn = setup();
        let b = quoted(&conn);

        let other = payment("c-2", 40.0);
        queries::insert_payment(&conn, &other).unwrap();
        assert!(matches!(
            accept_ride_quote(&conn, &b.id, "c-2", &other),
            Err(AppError::Forbidden(_))
        ));

        let short = payment("c-1", 39.99);
        queries::insert_payment(&conn, &short).unwrap();
        let msg = bad_request_message(accept_ride_quote(&conn, &b.id, "c-1", &short).unwrap_err());
        assert!(msg.contains("does not cover"), "{msg}");

        queries::release_driver(&conn, "d-1").unwrap();
        let first = assigned(&conn);
        let used_id = first.payment_id.unwrap();
        let used = queries::get_payment(&conn, &used_id).unwrap().unwrap();
        let msg = bad_request_message(accept_ride_quote(&conn, &b.id, "c-1", &used).unwrap_err());
        assert_eq!(msg, "Payment has already been used for another booking");

        assert_eq!(get_booking(&conn, &b.id).unwrap().status, BookingStatus::AwaitingAcceptance);
    }

    #[test]
    fn test_cancel_by_other_customer_is_forbidden() {
        let conn = setup();
        let b = submit_ride_request(&conn, "c-2", request()).unwrap();

        assert!(matches!(
            cancel_booking(&conn, &b.id, "c-1"),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(get_booking(&conn, &b.id).unwrap().status, BookingStatus::Pending);
    }

    #[test]
    fn test_cancel_quote_releases_driver() {
        let conn = setup();
        let b = quoted(&conn);

        let cancelled = cancel_booking(&conn, &b.id, "c-1").unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(driver_status(&conn, "d-1"), DriverStatus::Available);
    }

    #[test]
    fn test_cancel_after_assignment_fails() {
        let conn = setup();
        let b = assigned(&conn);

        let msg = bad_request_message(cancel_booking(&conn, &b.id, "c-1").unwrap_err());
        assert!(msg.contains("booking is Assigned"), "{msg}");
        assert_eq!(driver_status(&conn, "d-1"), DriverStatus::OnTrip);
    }

    #[test]
    fn test_full_ride_releases_driver() {
        let conn = setup();
        let b = assigned(&conn);

        let b = start_heading_to_pickup(&conn, &b.id, "d-1").unwrap();
        assert_eq!(b.status, BookingStatus::HeadingToPickup);
        let b = mark_arrived_at_pickup(&conn, &b.id, "d-1").unwrap();
        assert_eq!(b.status, BookingStatus::ArrivedAtPickup);
        let b = start_ride(&conn, &b.id, "d-1").unwrap();
        assert_eq!(b.status, BookingStatus::EnRoute);
        assert_eq!(driver_status(&conn, "d-1"), DriverStatus::OnTrip);

        let b = complete_ride(&conn, &b.id, "d-1").unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
        assert_eq!(driver_status(&conn, "d-1"), DriverStatus::Available);
    }

    #[test]
    fn test_steps_only_from_exact_predecessor() {
        let conn = setup();
        let b = assigned(&conn);

        for step in [RideStep::ArriveAtPickup, RideStep::StartRide, RideStep::Complete] {
            let msg = bad_request_message(advance_ride(&conn, &b.id, "d-1", step).unwrap_err());
            assert!(msg.contains("Allowed next status: Heading-To-Pickup"), "{msg}");
        }
        assert_eq!(get_booking(&conn, &b.id).unwrap().status, BookingStatus::Assigned);
    }

    #[test]
    fn test_other_driver_cannot_advance() {
        let conn = setup();
        let b = assigned(&conn);

        assert!(matches!(
            start_heading_to_pickup(&conn, &b.id, "d-2"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_completed_booking_is_final() {
        let conn = setup();
        let b = assigned(&conn);
        for step in [RideStep::HeadToPickup, RideStep::ArriveAtPickup, RideStep::StartRide, RideStep::Complete] {
            advance_ride(&conn, &b.id, "d-1", step).unwrap();
        }

        for step in [RideStep::HeadToPickup, RideStep::ArriveAtPickup, RideStep::StartRide, RideStep::Complete] {
            let msg = bad_request_message(advance_ride(&conn, &b.id, "d-1", step).unwrap_err());
            assert!(msg.contains("none (final state)"), "{msg}");
        }
        assert!(matches!(cancel_booking(&conn, &b.id, "c-1"), Err(AppError::BadRequest(_))));
        assert!(matches!(
            assign_driver_and_set_price(&conn, &b.id, "d-1", 10.0, "admin"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_reject_pending_booking() {
        let conn = setup();
        let b = submit_ride_request(&conn, "c-1", request()).unwrap();

        assert!(matches!(
            reject_booking(&conn, &b.id, "   ", "admin"),
            Err(AppError::BadRequest(_))
        ));
        let long = "x".repeat(MAX_REJECTION_REASON_LEN + 1);
        assert!(matches!(
            reject_booking(&conn, &b.id, &long, "admin"),
            Err(AppError::BadRequest(_))
        ));

        let rejected = reject_booking(&conn, &b.id, "Outside service area", "admin").unwrap();
        assert_eq!(rejected.status, BookingStatus::RejectedByAdmin);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Outside service area"));

        assert!(matches!(cancel_booking(&conn, &b.id, "c-1"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_assigned_rides_are_active_only() {
        let conn = setup();
        let active = assigned(&conn);
        let done = {
            let b = submit_ride_request(&conn, "c-2", request()).unwrap();
            queries::release_driver(&conn, "d-1").unwrap();
            let b = assign_driver_and_set_price(&conn, &b.id, "d-1", 20.0, "admin").unwrap();
            cancel_booking(&conn, &b.id, "c-2").unwrap()
        };
        assert_eq!(done.status, BookingStatus::Cancelled);

        let rides = fetch_assigned_rides(&conn, "d-1").unwrap();
        assert_eq!(rides.len(), 1);
        assert_eq!(rides[0].id, active.id);

        assert!(matches!(fetch_assigned_rides(&conn, "ghost"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_held_driver_status_is_not_editable() {
        let conn = setup();
        let booking = quoted(&conn);

        let msg = bad_request_message(
            ensure_driver_status_editable(&conn, "d-1", DriverStatus::Available).unwrap_err(),
        );
        assert!(msg.contains(&booking.id), "{msg}");
        assert!(ensure_driver_status_editable(&conn, "d-1", DriverStatus::OnTrip).is_ok());

        cancel_booking(&conn, &booking.id, "c-1").unwrap();
        assert!(ensure_driver_status_editable(&conn, "d-1", DriverStatus::Offline).is_ok());
        assert!(ensure_driver_status_editable(&conn, "d-2", DriverStatus::Available).is_ok());
    }

    #[test]
    fn test_missing_booking_is_not_found() {
        let conn = setup();
        assert!(matches!(get_booking(&conn, "nope"), Err(AppError::NotFound(_))));
        assert!(matches!(cancel_booking(&conn, "nope", "c-1"), Err(AppError::NotFound(_))));
        assert!(matches!(complete_ride(&conn, "nope", "d-1"), Err(AppError::NotFound(_))));
    }
}
