use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::{empty_string_as_none, ValidatedJson};
use super::response::{success, ApiResult};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{issue_token, Actor, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingFilter, Customer, CustomerPatch, CustomerStatus, Location, Payment};
use crate::services::booking::{self as engine, RideRequest};
use crate::services::notifications;
use crate::services::payments;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingIdRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,
}

fn current_customer(actor: &Actor) -> Result<&str, AppError> {
    actor.require_role(&[Role::Customer])?;
    Ok(&actor.user_id)
}

// ── Profile ──

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "phoneNumber is required"))]
    pub phone_number: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

// POST /customer/profile/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> ApiResult<Customer> {
    let email = req.email.trim().to_lowercase();
    let password_hash = hash_password(&req.password, state.config.bcrypt_cost)
        .map_err(|e| AppError::Internal(e.into()))?;

    let now = Utc::now().naive_utc();
    let customer = Customer {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email,
        phone_number: Some(req.phone_number),
        password_hash,
        fcm_token: None,
        status: CustomerStatus::Unverified,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        if queries::find_customer_by_email(&db, &customer.email)?.is_some() {
            return Err(AppError::BadRequest("Email already exists".to_string()));
        }
        queries::insert_customer(&db, &customer)?;
    }

    tracing::info!(customer_id = %customer.id, "customer signed up");
    success(customer)
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Serialize)]
pub struct CustomerLogin {
    token: String,
    customer: Customer,
}

// POST /customer/profile/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<CustomerLogin> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let customer = {
        let db = state.db.lock().unwrap();
        queries::find_customer_by_email(&db, req.email.trim())?
    }
    .ok_or_else(invalid)?;

    let matches = verify_password(&req.password, &customer.password_hash)
        .map_err(|e| AppError::Internal(e.into()))?;
    if !matches {
        return Err(invalid());
    }

    let token = issue_token(
        &customer.id,
        &customer.email,
        &customer.name,
        Role::Customer,
        &state.config.jwt,
    )?;

    tracing::info!(customer_id = %customer.id, "customer logged in");
    success(CustomerLogin { token, customer })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenRequest {
    #[validate(length(min = 1, message = "fcmToken is required"))]
    pub fcm_token: String,
}

// POST /customer/profile/postFcmToken
pub async fn post_fcm_token(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<FcmTokenRequest>,
) -> ApiResult<Customer> {
    let customer_id = current_customer(&actor)?;

    let patch = CustomerPatch {
        fcm_token: Some(req.fcm_token),
        ..Default::default()
    };
    let customer = {
        let db = state.db.lock().unwrap();
        if !queries::update_customer(&db, customer_id, &patch)? {
            return Err(AppError::NotFound("Customer not found".to_string()));
        }
        queries::get_customer(&db, customer_id)?
    }
    .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    success(customer)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub phone_number: Option<String>,
}

// POST /customer/profile/updateProfile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<Customer> {
    let customer_id = current_customer(&actor)?;

    let patch = CustomerPatch {
        name: req.name,
        email: req.email.map(|e| e.to_lowercase()),
        phone_number: req.phone_number,
        ..Default::default()
    };

    let customer = {
        let db = state.db.lock().unwrap();
        ensure_email_free(&db, patch.email.as_deref(), customer_id)?;
        if !queries::update_customer(&db, customer_id, &patch)? {
            return Err(AppError::NotFound("Customer not found".to_string()));
        }
        queries::get_customer(&db, customer_id)?
    }
    .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    success(customer)
}

/// Fails if `email` belongs to a customer other than `owner_id`.
pub fn ensure_email_free(
    conn: &rusqlite::Connection,
    email: Option<&str>,
    owner_id: &str,
) -> Result<(), AppError> {
    if let Some(email) = email {
        if let Some(existing) = queries::find_customer_by_email(conn, email)? {
            if existing.id != owner_id {
                return Err(AppError::BadRequest("Email already exists".to_string()));
            }
        }
    }
    Ok(())
}

// ── Bookings ──

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRideRequest {
    pub start_location: Location,
    pub final_location: Location,
    #[serde(default)]
    pub stops: Option<Vec<Location>>,
    pub number_of_passengers: i64,
    #[serde(default)]
    pub number_of_luggage: i64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub note: Option<String>,
    pub contact_info: String,
    pub ride_time: DateTime<Utc>,
}

impl From<SubmitRideRequest> for RideRequest {
    fn from(req: SubmitRideRequest) -> Self {
        Self {
            start_location: req.start_location,
            final_location: req.final_location,
            stops: req.stops.unwrap_or_default(),
            number_of_passengers: req.number_of_passengers,
            number_of_luggage: req.number_of_luggage,
            note: req.note,
            contact_info: req.contact_info.trim().to_string(),
            ride_time: req.ride_time.naive_utc(),
        }
    }
}

// POST /customer/booking/submitRequest
pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<SubmitRideRequest>,
) -> ApiResult<Booking> {
    let customer_id = current_customer(&actor)?;

    let booking = {
        let db = state.db.lock().unwrap();
        engine::submit_ride_request(&db, customer_id, req.into())?
    };

    notifications::announce_booking(&state, &booking).await;
    success(booking)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptQuoteRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,
    #[validate(length(min = 1, message = "paymentIntentId is required"))]
    pub payment_intent_id: String,
}

// POST /customer/booking/acceptQuote
pub async fn accept_quote(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<AcceptQuoteRequest>,
) -> ApiResult<Booking> {
    let customer_id = current_customer(&actor)?;

    let booking = engine::accept_quote_with_payment(
        &state,
        &req.booking_id,
        customer_id,
        &req.payment_intent_id,
    )
    .await?;

    success(booking)
}

// POST /customer/booking/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<BookingIdRequest>,
) -> ApiResult<Booking> {
    let customer_id = current_customer(&actor)?;

    let booking = {
        let db = state.db.lock().unwrap();
        engine::cancel_booking(&db, &req.booking_id, customer_id)?
    };

    notifications::announce_booking(&state, &booking).await;
    success(booking)
}

// GET /customer/booking/byCustomer
pub async fn by_customer(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Vec<Booking>> {
    let customer_id = current_customer(&actor)?;

    let filter = BookingFilter {
        customer_id: Some(customer_id.to_string()),
        ..Default::default()
    };
    let bookings = {
        let db = state.db.lock().unwrap();
        engine::list_bookings(&db, &filter)?
    };

    success(bookings)
}

// ── Payments ──

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntentRequest {
    pub amount: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    client_secret: Option<String>,
    payment_intent_id: String,
    amount: f64,
    currency: String,
}

// POST /customer/payment/createIntent
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<CreateIntentRequest>,
) -> ApiResult<CreatedIntent> {
    let customer_id = current_customer(&actor)?;

    let intent = payments::create_payment_intent(&state, customer_id, req.amount).await?;

    success(CreatedIntent {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount: payments::from_minor_units(intent.amount_minor),
        currency: intent.currency.to_uppercase(),
    })
}

// GET /customer/payment/history
pub async fn payment_history(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Vec<Payment>> {
    let customer_id = current_customer(&actor)?;

    let payments = {
        let db = state.db.lock().unwrap();
        queries::list_customer_payments(&db, customer_id)?
    };

    success(payments)
}
