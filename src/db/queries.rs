use anyhow::anyhow;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    AdminOtp, Booking, BookingFilter, BookingStatus, Customer, CustomerPatch, CustomerStatus,
    Driver, DriverPatch, DriverStatus, Location, Notification, NotificationKind, OtpStatus,
    Payment, VehicleDetails,
};

/// Sortable as text. The fraction is optional when parsing, so SQLite's own
/// `datetime('now')` defaults read back too.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn format_ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map_err(|e| anyhow!("invalid timestamp in database: {s:?}: {e}"))
}

fn now_ts() -> String {
    format_ts(&Utc::now().naive_utc())
}

// ── Customers ──

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone_number, password_hash, fcm_token, status, created_at, updated_at";

pub fn insert_customer(conn: &Connection, customer: &Customer) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO customers (id, name, email, phone_number, password_hash, fcm_token, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            customer.id,
            customer.name,
            customer.email,
            customer.phone_number,
            customer.password_hash,
            customer.fcm_token,
            customer.status.as_str(),
            format_ts(&customer.created_at),
            format_ts(&customer.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_customer(conn: &Connection, id: &str) -> anyhow::Result<Option<Customer>> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_customer_row(row)));

    match result {
        Ok(customer) => Ok(Some(customer?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_customer_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<Customer>> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = ?1 COLLATE NOCASE");
    let result = conn.query_row(&sql, params![email], |row| Ok(parse_customer_row(row)));

    match result {
        Ok(customer) => Ok(Some(customer?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_customers(conn: &Connection) -> anyhow::Result<Vec<Customer>> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_customer_row(row)))?;

    let mut customers = vec![];
    for row in rows {
        customers.push(row??);
    }
    Ok(customers)
}

/// Applies the non-empty fields of `patch`. Returns false if no such customer.
pub fn update_customer(conn: &Connection, id: &str, patch: &CustomerPatch) -> anyhow::Result<bool> {
    let mut sets: Vec<&str> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(name) = &patch.name {
        sets.push("name = ?");
        params_vec.push(Box::new(name.clone()));
    }
    if let Some(email) = &patch.email {
        sets.push("email = ?");
        params_vec.push(Box::new(email.clone()));
    }
    if let Some(phone) = &patch.phone_number {
        sets.push("phone_number = ?");
        params_vec.push(Box::new(phone.clone()));
    }
    if let Some(token) = &patch.fcm_token {
        sets.push("fcm_token = ?");
        params_vec.push(Box::new(token.clone()));
    }
    if let Some(status) = patch.status {
        sets.push("status = ?");
        params_vec.push(Box::new(status.as_str()));
    }

    sets.push("updated_at = ?");
    params_vec.push(Box::new(now_ts()));
    params_vec.push(Box::new(id.to_string()));

    let sql = format!("UPDATE customers SET {} WHERE id = ?", sets.join(", "));
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let count = conn.execute(&sql, params_refs.as_slice())?;
    Ok(count > 0)
}

pub fn delete_customer(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM customers WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// Bookings and payments that still point at this customer.
pub fn count_customer_references(conn: &Connection, id: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM bookings WHERE customer_id = ?1)
              + (SELECT COUNT(*) FROM payments WHERE customer_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_customer_row(row: &rusqlite::Row) -> anyhow::Result<Customer> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        password_hash: row.get(4)?,
        fcm_token: row.get(5)?,
        status: CustomerStatus::parse(&status_str),
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Drivers ──

const DRIVER_COLUMNS: &str = "id, name, email, password_hash, vehicle_model, vehicle_license_plate, status, created_at, updated_at";

pub fn insert_driver(conn: &Connection, driver: &Driver) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO drivers (id, name, email, password_hash, vehicle_model, vehicle_license_plate, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            driver.id,
            driver.name,
            driver.email,
            driver.password_hash,
            driver.vehicle_details.model,
            driver.vehicle_details.license_plate,
            driver.status.as_str(),
            format_ts(&driver.created_at),
            format_ts(&driver.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_driver(conn: &Connection, id: &str) -> anyhow::Result<Option<Driver>> {
    let sql = format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_driver_row(row)));

    match result {
        Ok(driver) => Ok(Some(driver?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_driver_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<Driver>> {
    let sql = format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE email = ?1 COLLATE NOCASE");
    let result = conn.query_row(&sql, params![email], |row| Ok(parse_driver_row(row)));

    match result {
        Ok(driver) => Ok(Some(driver?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_drivers(conn: &Connection, status: Option<DriverStatus>) -> anyhow::Result<Vec<Driver>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status {
        Some(status) => (
            format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE status = ?1 ORDER BY created_at DESC"),
            vec![Box::new(status.as_str()) as Box<dyn rusqlite::types::ToSql>],
        ),
        None => (
            format!("SELECT {DRIVER_COLUMNS} FROM drivers ORDER BY created_at DESC"),
            vec![],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_driver_row(row)))?;

    let mut drivers = vec![];
    for row in rows {
        drivers.push(row??);
    }
    Ok(drivers)
}

pub fn update_driver(conn: &Connection, id: &str, patch: &DriverPatch) -> anyhow::Result<bool> {
    let mut sets: Vec<&str> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(name) = &patch.name {
        sets.push("name = ?");
        params_vec.push(Box::new(name.clone()));
    }
    if let Some(email) = &patch.email {
        sets.push("email = ?");
        params_vec.push(Box::new(email.clone()));
    }
    if let Some(vehicle) = &patch.vehicle_details {
        sets.push("vehicle_model = ?");
        params_vec.push(Box::new(vehicle.model.clone()));
        sets.push("vehicle_license_plate = ?");
        params_vec.push(Box::new(vehicle.license_plate.clone()));
    }
    if let Some(status) = patch.status {
        sets.push("status = ?");
        params_vec.push(Box::new(status.as_str()));
    }

    sets.push("updated_at = ?");
    params_vec.push(Box::new(now_ts()));
    params_vec.push(Box::new(id.to_string()));

    let sql = format!("UPDATE drivers SET {} WHERE id = ?", sets.join(", "));
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let count = conn.execute(&sql, params_refs.as_slice())?;
    Ok(count > 0)
}

pub fn delete_driver(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM drivers WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn count_driver_bookings(conn: &Connection, id: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE driver_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Flips an available driver to on_trip. False if the driver was not
/// available at the moment of the update.
pub fn claim_driver(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE drivers SET status = 'on_trip', updated_at = ?2 WHERE id = ?1 AND status = 'available'",
        params![id, now_ts()],
    )?;
    Ok(count > 0)
}

pub fn release_driver(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE drivers SET status = 'available', updated_at = ?2 WHERE id = ?1",
        params![id, now_ts()],
    )?;
    Ok(())
}

fn parse_driver_row(row: &rusqlite::Row) -> anyhow::Result<Driver> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Driver {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        vehicle_details: VehicleDetails {
            model: row.get(4)?,
            license_plate: row.get(5)?,
        },
        status: DriverStatus::parse(&status_str),
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer_id, driver_id, start_location, final_location, stops, \
     number_of_passengers, number_of_luggage, note, contact_info, ride_time, final_price, status, \
     rejection_reason, payment_id, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, driver_id, start_location, final_location, stops,
             number_of_passengers, number_of_luggage, note, contact_info, ride_time, final_price,
             status, rejection_reason, payment_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            booking.id,
            booking.customer_id,
            booking.driver_id,
            serde_json::to_string(&booking.start_location)?,
            serde_json::to_string(&booking.final_location)?,
            serde_json::to_string(&booking.stops)?,
            booking.number_of_passengers,
            booking.number_of_luggage,
            booking.note,
            booking.contact_info,
            format_ts(&booking.ride_time),
            booking.final_price,
            booking.status.as_str(),
            booking.rejection_reason,
            booking.payment_id,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_booking_by_payment(conn: &Connection, payment_id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_id = ?1");
    let result = conn.query_row(&sql, params![payment_id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<&str> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = filter.status {
        clauses.push("status = ?");
        params_vec.push(Box::new(status.as_str()));
    }
    if let Some(customer_id) = &filter.customer_id {
        clauses.push("customer_id = ?");
        params_vec.push(Box::new(customer_id.clone()));
    }
    if let Some(driver_id) = &filter.driver_id {
        clauses.push("driver_id = ?");
        params_vec.push(Box::new(driver_id.clone()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings {where_sql} ORDER BY created_at DESC, id");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// A driver's bookings whose status is one of `statuses`, soonest ride first.
pub fn list_driver_bookings_in(
    conn: &Connection,
    driver_id: &str,
    statuses: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    if statuses.is_empty() {
        return Ok(vec![]);
    }

    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE driver_id = ? AND status IN ({placeholders}) ORDER BY ride_time ASC"
    );

    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(driver_id.to_string())];
    for status in statuses {
        params_vec.push(Box::new(status.as_str()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Moves a booking from `from` to `to` only if it is still in `from`.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), now_ts()],
    )?;
    Ok(count > 0)
}

/// Pending → Awaiting-Acceptance with the quoted driver and price.
pub fn assign_booking(
    conn: &Connection,
    id: &str,
    driver_id: &str,
    final_price: f64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET driver_id = ?2, final_price = ?3, status = ?4, updated_at = ?5
         WHERE id = ?1 AND status = ?6",
        params![
            id,
            driver_id,
            final_price,
            BookingStatus::AwaitingAcceptance.as_str(),
            now_ts(),
            BookingStatus::Pending.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Awaiting-Acceptance → Assigned, linking the payment that covered the quote.
pub fn accept_booking(conn: &Connection, id: &str, payment_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_id = ?2, status = ?3, updated_at = ?4
         WHERE id = ?1 AND status = ?5 AND payment_id IS NULL",
        params![
            id,
            payment_id,
            BookingStatus::Assigned.as_str(),
            now_ts(),
            BookingStatus::AwaitingAcceptance.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn reject_booking(conn: &Connection, id: &str, reason: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET rejection_reason = ?2, status = ?3, updated_at = ?4
         WHERE id = ?1 AND status = ?5",
        params![
            id,
            reason,
            BookingStatus::RejectedByAdmin.as_str(),
            now_ts(),
            BookingStatus::Pending.as_str(),
        ],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_json: String = row.get(3)?;
    let final_json: String = row.get(4)?;
    let stops_json: String = row.get(5)?;
    let ride_time_str: String = row.get(10)?;
    let status_str: String = row.get(12)?;
    let created_at_str: String = row.get(15)?;
    let updated_at_str: String = row.get(16)?;

    let start_location: Location = serde_json::from_str(&start_json)?;
    let final_location: Location = serde_json::from_str(&final_json)?;
    let stops: Vec<Location> = serde_json::from_str(&stops_json)?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow!("unknown booking status in database: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        driver_id: row.get(2)?,
        start_location,
        final_location,
        stops,
        number_of_passengers: row.get(6)?,
        number_of_luggage: row.get(7)?,
        note: row.get(8)?,
        contact_info: row.get(9)?,
        ride_time: parse_ts(&ride_time_str)?,
        final_price: row.get(11)?,
        status,
        rejection_reason: row.get(13)?,
        payment_id: row.get(14)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Payments ──

const PAYMENT_COLUMNS: &str = "id, customer_id, payment_intent_id, amount, currency, payment_method, stripe_charge_id, created_at, updated_at";

/// Records a payment unless one already exists for the same intent.
/// Returns false when the intent was already recorded.
pub fn insert_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT INTO payments (id, customer_id, payment_intent_id, amount, currency, payment_method, stripe_charge_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(payment_intent_id) DO NOTHING",
        params![
            payment.id,
            payment.customer_id,
            payment.payment_intent_id,
            payment.amount,
            payment.currency,
            payment.payment_method,
            payment.stripe_charge_id,
            format_ts(&payment.created_at),
            format_ts(&payment.updated_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_payment(conn: &Connection, id: &str) -> anyhow::Result<Option<Payment>> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_payment_row(row)));

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_payment_by_intent(conn: &Connection, intent_id: &str) -> anyhow::Result<Option<Payment>> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_intent_id = ?1");
    let result = conn.query_row(&sql, params![intent_id], |row| Ok(parse_payment_row(row)));

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_customer_payments(conn: &Connection, customer_id: &str) -> anyhow::Result<Vec<Payment>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = ?1 ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![customer_id], |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Payment {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        payment_intent_id: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        payment_method: row.get(5)?,
        stripe_charge_id: row.get(6)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Notifications ──

pub fn insert_notification(conn: &Connection, notification: &Notification) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, title, message, kind, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.id,
            notification.user_id,
            notification.title,
            notification.message,
            notification.kind.as_str(),
            notification.read,
            format_ts(&notification.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_notification(conn: &Connection, id: &str) -> anyhow::Result<Option<Notification>> {
    let result = conn.query_row(
        "SELECT id, user_id, title, message, kind, is_read, created_at FROM notifications WHERE id = ?1",
        params![id],
        |row| Ok(parse_notification_row(row)),
    );

    match result {
        Ok(notification) => Ok(Some(notification?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_notifications(
    conn: &Connection,
    user_id: &str,
    unread_only: bool,
) -> anyhow::Result<Vec<Notification>> {
    let sql = if unread_only {
        "SELECT id, user_id, title, message, kind, is_read, created_at FROM notifications
         WHERE user_id = ?1 AND is_read = 0 ORDER BY created_at DESC, rowid DESC"
    } else {
        "SELECT id, user_id, title, message, kind, is_read, created_at FROM notifications
         WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_notification_row(row)))?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row??);
    }
    Ok(notifications)
}

pub fn mark_notification_read(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

fn parse_notification_row(row: &rusqlite::Row) -> anyhow::Result<Notification> {
    let kind_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        kind: NotificationKind::parse(&kind_str),
        read: row.get(5)?,
        created_at: parse_ts(&created_at_str)?,
    })
}

// ── Admin OTP ──

const ADMIN_OTP_ID: &str = "admin";

/// Replaces the admin code with a fresh active one.
pub fn save_admin_otp(conn: &Connection, otp: &str) -> anyhow::Result<()> {
    let now = now_ts();
    conn.execute(
        "INSERT INTO admin_otps (id, otp, status, created_at, updated_at)
         VALUES (?1, ?2, 'active', ?3, ?3)
         ON CONFLICT(id) DO UPDATE SET
           otp = excluded.otp,
           status = 'active',
           updated_at = excluded.updated_at",
        params![ADMIN_OTP_ID, otp, now],
    )?;
    Ok(())
}

pub fn get_admin_otp(conn: &Connection) -> anyhow::Result<Option<AdminOtp>> {
    let result = conn.query_row(
        "SELECT otp, status, updated_at FROM admin_otps WHERE id = ?1",
        params![ADMIN_OTP_ID],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((otp, status_str, updated_at_str)) => Ok(Some(AdminOtp {
            otp,
            status: OtpStatus::parse(&status_str),
            updated_at: parse_ts(&updated_at_str)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Consumes the code if it is still active. False if it was already used.
pub fn consume_admin_otp(conn: &Connection, otp: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE admin_otps SET status = ?3, updated_at = ?4 WHERE id = ?1 AND otp = ?2 AND status = ?5",
        params![
            ADMIN_OTP_ID,
            otp,
            OtpStatus::Used.as_str(),
            now_ts(),
            OtpStatus::Active.as_str(),
        ],
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn customer(id: &str, email: &str) -> Customer {
        let now = Utc::now().naive_utc();
        Customer {
            id: id.to_string(),
            name: "Alice".to_string(),
            email: email.to_string(),
            phone_number: None,
            password_hash: "hash".to_string(),
            fcm_token: None,
            status: CustomerStatus::Unverified,
            created_at: now,
            updated_at: now,
        }
    }

    fn driver(id: &str, status: DriverStatus) -> Driver {
        let now = Utc::now().naive_utc();
        Driver {
            id: id.to_string(),
            name: "Dana".to_string(),
            email: format!("{id}@example.com"),
            password_hash: "hash".to_string(),
            vehicle_details: VehicleDetails {
                model: "Sedan".to_string(),
                license_plate: "AB-123".to_string(),
            },
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn booking(id: &str, customer_id: &str) -> Booking {
        let now = Utc::now().naive_utc();
        let here = Location {
            longitude: 10.0,
            latitude: 20.0,
            location_name: "Home".to_string(),
        };
        Booking {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            driver_id: None,
            start_location: here.clone(),
            final_location: here,
            stops: vec![],
            number_of_passengers: 1,
            number_of_luggage: 0,
            note: None,
            contact_info: "555-0100".to_string(),
            ride_time: now + chrono::Duration::hours(2),
            final_price: None,
            status: BookingStatus::Pending,
            rejection_reason: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_booking_round_trip_keeps_locations() {
        let conn = init_db(":memory:").unwrap();
        insert_customer(&conn, &customer("c-1", "a@example.com")).unwrap();

        let mut b = booking("b-1", "c-1");
        b.stops.push(Location {
            longitude: -1.5,
            latitude: 0.25,
            location_name: "Shop".to_string(),
        });
        insert_booking(&conn, &b).unwrap();

        let loaded = get_booking(&conn, "b-1").unwrap().unwrap();
        assert_eq!(loaded.start_location, b.start_location);
        assert_eq!(loaded.stops, b.stops);
        assert_eq!(loaded.status, BookingStatus::Pending);
        assert!(get_booking(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_timestamps_round_trip_exactly() {
        let conn = init_db(":memory:").unwrap();
        insert_customer(&conn, &customer("c-1", "a@example.com")).unwrap();

        let mut b = booking("b-1", "c-1");
        b.ride_time = NaiveDateTime::parse_from_str("2031-05-06 07:08:09.123456789", TS_FORMAT).unwrap();
        insert_booking(&conn, &b).unwrap();

        let loaded = get_booking(&conn, "b-1").unwrap().unwrap();
        assert_eq!(loaded.ride_time, b.ride_time);
        assert_eq!(loaded.created_at, b.created_at);
    }

    #[test]
    fn test_sqlite_default_timestamp_parses() {
        let parsed = parse_ts("2030-01-02 03:04:05").unwrap();
        assert_eq!(format_ts(&parsed), "2030-01-02 03:04:05");
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let conn = init_db(":memory:").unwrap();
        insert_customer(&conn, &customer("c-1", "a@example.com")).unwrap();
        insert_booking(&conn, &booking("b-1", "c-1")).unwrap();
        conn.execute("UPDATE bookings SET ride_time = 'tomorrow' WHERE id = 'b-1'", [])
            .unwrap();

        let err = get_booking(&conn, "b-1").unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"), "{err}");
    }

    #[test]
    fn test_transition_is_conditional_on_current_status() {
        let conn = init_db(":memory:").unwrap();
        insert_customer(&conn, &customer("c-1", "a@example.com")).unwrap();
        insert_booking(&conn, &booking("b-1", "c-1")).unwrap();

        assert!(transition_booking(&conn, "b-1", BookingStatus::Pending, BookingStatus::Cancelled).unwrap());
        assert!(!transition_booking(&conn, "b-1", BookingStatus::Pending, BookingStatus::Cancelled).unwrap());
    }

    #[test]
    fn test_claim_driver_only_once() {
        let conn = init_db(":memory:").unwrap();
        insert_driver(&conn, &driver("d-1", DriverStatus::Available)).unwrap();

        assert!(claim_driver(&conn, "d-1").unwrap());
        assert!(!claim_driver(&conn, "d-1").unwrap());
        assert_eq!(get_driver(&conn, "d-1").unwrap().unwrap().status, DriverStatus::OnTrip);

        release_driver(&conn, "d-1").unwrap();
        assert_eq!(get_driver(&conn, "d-1").unwrap().unwrap().status, DriverStatus::Available);
    }

    #[test]
    fn test_list_bookings_filters() {
        let conn = init_db(":memory:").unwrap();
        insert_customer(&conn, &customer("c-1", "a@example.com")).unwrap();
        insert_customer(&conn, &customer("c-2", "b@example.com")).unwrap();
        insert_booking(&conn, &booking("b-1", "c-1")).unwrap();
        insert_booking(&conn, &booking("b-2", "c-2")).unwrap();
        transition_booking(&conn, "b-2", BookingStatus::Pending, BookingStatus::Cancelled).unwrap();

        let all = list_bookings(&conn, &BookingFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let pending = list_bookings(
            &conn,
            &BookingFilter {
                status: Some(BookingStatus::Pending),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b-1");

        let by_customer = list_bookings(
            &conn,
            &BookingFilter {
                customer_id: Some("c-2".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_customer.len(), 1);
        assert_eq!(by_customer[0].status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_customer_patch_and_references() {
        let conn = init_db(":memory:").unwrap();
        insert_customer(&conn, &customer("c-1", "a@example.com")).unwrap();

        let patch = CustomerPatch {
            fcm_token: Some("tok".to_string()),
            ..Default::default()
        };
        assert!(update_customer(&conn, "c-1", &patch).unwrap());
        assert!(!update_customer(&conn, "nope", &patch).unwrap());

        let found = find_customer_by_email(&conn, "A@Example.com").unwrap().unwrap();
        assert_eq!(found.fcm_token.as_deref(), Some("tok"));

        assert_eq!(count_customer_references(&conn, "c-1").unwrap(), 0);
        insert_booking(&conn, &booking("b-1", "c-1")).unwrap();
        assert_eq!(count_customer_references(&conn, "c-1").unwrap(), 1);
    }

    #[test]
    fn test_admin_otp_is_single_use() {
        let conn = init_db(":memory:").unwrap();
        save_admin_otp(&conn, "12345678").unwrap();
        save_admin_otp(&conn, "87654321").unwrap();

        let stored = get_admin_otp(&conn).unwrap().unwrap();
        assert_eq!(stored.otp, "87654321");
        assert_eq!(stored.status, OtpStatus::Active);

        assert!(!consume_admin_otp(&conn, "12345678").unwrap());
        assert!(consume_admin_otp(&conn, "87654321").unwrap());
        assert!(!consume_admin_otp(&conn, "87654321").unwrap());
    }
}
