use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::customer::ensure_email_free;
use super::extract::{empty_string_as_none, ValidatedJson, ValidatedQuery};
use super::response::{success, ApiResult};
use crate::auth::password::hash_password;
use crate::auth::{Actor, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingFilter, BookingStatus, Customer, CustomerPatch, CustomerStatus, Driver,
    DriverPatch, DriverStatus, VehicleDetails,
};
use crate::services::booking as engine;
use crate::services::{notifications, otp};
use crate::state::AppState;

fn require_admin(actor: &Actor) -> Result<&str, AppError> {
    actor.require_role(&[Role::Admin])?;
    Ok(&actor.user_id)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordIdRequest {
    #[validate(length(min = 1, message = "recordId is required"))]
    pub record_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IdRequest {
    #[validate(length(min = 1, message = "id is required"))]
    pub id: String,
}

#[derive(Serialize)]
pub struct Deleted {
    id: String,
    deleted: bool,
}

// ── Auth ──

#[derive(Serialize)]
pub struct OtpSent {
    message: &'static str,
}

// POST /admin/auth/sendOtp
pub async fn send_otp(State(state): State<Arc<AppState>>) -> ApiResult<OtpSent> {
    otp::send_admin_otp(&state).await?;
    success(OtpSent {
        message: "OTP sent to the admin email",
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(equal = 8, message = "otp must be 8 digits"))]
    pub otp: String,
}

#[derive(Serialize)]
pub struct AdminToken {
    token: String,
}

// POST /admin/auth/verifyOtp
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> ApiResult<AdminToken> {
    let token = otp::verify_admin_otp(&state, req.otp.trim())?;
    success(AdminToken { token })
}

// ── Drivers ──

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddDriverRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(nested)]
    pub vehicle_details: VehicleDetails,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<DriverStatus>,
}

// POST /admin/driver/addRecord
pub async fn add_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<AddDriverRequest>,
) -> ApiResult<Driver> {
    require_admin(&actor)?;

    let password_hash = hash_password(&req.password, state.config.bcrypt_cost)
        .map_err(|e| AppError::Internal(e.into()))?;

    let now = Utc::now().naive_utc();
    let driver = Driver {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        password_hash,
        vehicle_details: req.vehicle_details,
        status: req.status.unwrap_or(DriverStatus::Available),
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        if queries::find_driver_by_email(&db, &driver.email)?.is_some() {
            return Err(AppError::BadRequest("Email already exists".to_string()));
        }
        queries::insert_driver(&db, &driver)?;
    }

    tracing::info!(driver_id = %driver.id, "driver added");
    success(driver)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DriverFilterRequest {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<DriverStatus>,
}

// POST /admin/driver/getAll
pub async fn get_drivers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<DriverFilterRequest>,
) -> ApiResult<Vec<Driver>> {
    require_admin(&actor)?;

    let drivers = {
        let db = state.db.lock().unwrap();
        queries::list_drivers(&db, req.status)?
    };
    success(drivers)
}

// POST /admin/driver/getById
pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<IdRequest>,
) -> ApiResult<Driver> {
    require_admin(&actor)?;

    let driver = {
        let db = state.db.lock().unwrap();
        queries::get_driver(&db, &req.id)?
    }
    .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;

    success(driver)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverRequest {
    #[validate(length(min = 1, message = "recordId is required"))]
    pub record_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub vehicle_details: Option<VehicleDetails>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<DriverStatus>,
}

// POST /admin/driver/updateRecord
pub async fn update_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<UpdateDriverRequest>,
) -> ApiResult<Driver> {
    require_admin(&actor)?;

    let patch = DriverPatch {
        name: req.name,
        email: req.email.map(|e| e.to_lowercase()),
        vehicle_details: req.vehicle_details,
        status: req.status,
    };

    let driver = {
        let db = state.db.lock().unwrap();
        if let Some(email) = &patch.email {
            if let Some(existing) = queries::find_driver_by_email(&db, email)? {
                if existing.id != req.record_id {
                    return Err(AppError::BadRequest("Email already exists".to_string()));
                }
            }
        }
        if let Some(status) = patch.status {
            engine::ensure_driver_status_editable(&db, &req.record_id, status)?;
        }
        if !queries::update_driver(&db, &req.record_id, &patch)? {
            return Err(AppError::NotFound("Driver not found".to_string()));
        }
        queries::get_driver(&db, &req.record_id)?
    }
    .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;

    tracing::info!(driver_id = %driver.id, "driver updated");
    success(driver)
}

// POST /admin/driver/deleteById
pub async fn delete_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<RecordIdRequest>,
) -> ApiResult<Deleted> {
    require_admin(&actor)?;

    {
        let db = state.db.lock().unwrap();
        if queries::count_driver_bookings(&db, &req.record_id)? > 0 {
            return Err(AppError::BadRequest(
                "Driver has bookings and cannot be deleted".to_string(),
            ));
        }
        if !queries::delete_driver(&db, &req.record_id)? {
            return Err(AppError::NotFound("Driver not found".to_string()));
        }
    }

    tracing::info!(driver_id = %req.record_id, "driver deleted");
    success(Deleted {
        id: req.record_id,
        deleted: true,
    })
}

// ── Customers ──

// POST /admin/customer/getAll
pub async fn get_customers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Vec<Customer>> {
    require_admin(&actor)?;

    let customers = {
        let db = state.db.lock().unwrap();
        queries::list_customers(&db)?
    };
    success(customers)
}

// POST /admin/customer/getById
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<IdRequest>,
) -> ApiResult<Customer> {
    require_admin(&actor)?;

    let customer = {
        let db = state.db.lock().unwrap();
        queries::get_customer(&db, &req.id)?
    }
    .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    success(customer)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, message = "recordId is required"))]
    pub record_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<CustomerStatus>,
}

// POST /admin/customer/updateRecord
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<UpdateCustomerRequest>,
) -> ApiResult<Customer> {
    require_admin(&actor)?;

    let patch = CustomerPatch {
        name: req.name,
        email: req.email.map(|e| e.to_lowercase()),
        phone_number: req.phone_number,
        fcm_token: None,
        status: req.status,
    };

    let customer = {
        let db = state.db.lock().unwrap();
        ensure_email_free(&db, patch.email.as_deref(), &req.record_id)?;
        if !queries::update_customer(&db, &req.record_id, &patch)? {
            return Err(AppError::NotFound("Customer not found".to_string()));
        }
        queries::get_customer(&db, &req.record_id)?
    }
    .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    tracing::info!(customer_id = %customer.id, "customer updated");
    success(customer)
}

// POST /admin/customer/deleteById
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<RecordIdRequest>,
) -> ApiResult<Deleted> {
    require_admin(&actor)?;

    {
        let db = state.db.lock().unwrap();
        if queries::count_customer_references(&db, &req.record_id)? > 0 {
            return Err(AppError::BadRequest(
                "Customer has bookings or payments and cannot be deleted".to_string(),
            ));
        }
        if !queries::delete_customer(&db, &req.record_id)? {
            return Err(AppError::NotFound("Customer not found".to_string()));
        }
    }

    tracing::info!(customer_id = %req.record_id, "customer deleted");
    success(Deleted {
        id: req.record_id,
        deleted: true,
    })
}

// ── Bookings ──

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<BookingStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub customer_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub driver_id: Option<String>,
}

// GET /admin/booking/getAll
pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedQuery(query): ValidatedQuery<BookingsQuery>,
) -> ApiResult<Vec<Booking>> {
    require_admin(&actor)?;

    let filter = BookingFilter {
        status: query.status,
        customer_id: query.customer_id,
        driver_id: query.driver_id,
    };
    let bookings = {
        let db = state.db.lock().unwrap();
        engine::list_bookings(&db, &filter)?
    };
    success(bookings)
}

// GET /admin/booking/getById
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedQuery(query): ValidatedQuery<IdRequest>,
) -> ApiResult<Booking> {
    require_admin(&actor)?;

    let booking = {
        let db = state.db.lock().unwrap();
        engine::get_booking(&db, &query.id)?
    };
    success(booking)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,
    #[validate(length(min = 1, message = "driverId is required"))]
    pub driver_id: String,
    pub final_price: f64,
}

// POST /admin/booking/assignDriverAndSetPrice
pub async fn assign_driver_and_set_price(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<AssignDriverRequest>,
) -> ApiResult<Booking> {
    let admin_id = require_admin(&actor)?;

    let booking = {
        let db = state.db.lock().unwrap();
        engine::assign_driver_and_set_price(
            &db,
            &req.booking_id,
            &req.driver_id,
            req.final_price,
            admin_id,
        )?
    };

    notifications::announce_booking(&state, &booking).await;
    success(booking)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectBookingRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,
    pub rejection_reason: String,
}

// POST /admin/booking/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<RejectBookingRequest>,
) -> ApiResult<Booking> {
    let admin_id = require_admin(&actor)?;

    let booking = {
        let db = state.db.lock().unwrap();
        engine::reject_booking(&db, &req.booking_id, &req.rejection_reason, admin_id)?
    };

    notifications::announce_booking(&state, &booking).await;
    success(booking)
}
