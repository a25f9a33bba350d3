use std::sync::Arc;

use axum::extract::State;
use serde::Serialize;

use super::customer::{BookingIdRequest, LoginRequest};
use super::extract::ValidatedJson;
use super::response::{success, ApiResult};
use crate::auth::password::verify_password;
use crate::auth::{issue_token, Actor, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, Driver};
use crate::services::booking as engine;
use crate::services::notifications;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DriverLogin {
    token: String,
    driver: Driver,
}

// POST /driver/profile/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<DriverLogin> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let driver = {
        let db = state.db.lock().unwrap();
        queries::find_driver_by_email(&db, req.email.trim())?
    }
    .ok_or_else(invalid)?;

    let matches = verify_password(&req.password, &driver.password_hash)
        .map_err(|e| AppError::Internal(e.into()))?;
    if !matches {
        return Err(invalid());
    }

    let token = issue_token(
        &driver.id,
        &driver.email,
        &driver.name,
        Role::Driver,
        &state.config.jwt,
    )?;

    tracing::info!(driver_id = %driver.id, "driver logged in");
    success(DriverLogin { token, driver })
}

// GET|POST /driver/booking/getAssignedRides
pub async fn get_assigned_rides(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Vec<Booking>> {
    actor.require_role(&[Role::Driver])?;

    let rides = {
        let db = state.db.lock().unwrap();
        engine::fetch_assigned_rides(&db, &actor.user_id)?
    };

    success(rides)
}

type RideTransition = fn(&rusqlite::Connection, &str, &str) -> Result<Booking, AppError>;

async fn step(
    state: &AppState,
    actor: &Actor,
    booking_id: &str,
    transition: RideTransition,
) -> ApiResult<Booking> {
    actor.require_role(&[Role::Driver])?;

    let booking = {
        let db = state.db.lock().unwrap();
        transition(&db, booking_id, &actor.user_id)?
    };

    notifications::announce_booking(state, &booking).await;
    success(booking)
}

// POST /driver/booking/startHeadingToPickup
pub async fn start_heading_to_pickup(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<BookingIdRequest>,
) -> ApiResult<Booking> {
    step(&state, &actor, &req.booking_id, engine::start_heading_to_pickup).await
}

// POST /driver/booking/markArrivedAtPickup
pub async fn mark_arrived_at_pickup(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<BookingIdRequest>,
) -> ApiResult<Booking> {
    step(&state, &actor, &req.booking_id, engine::mark_arrived_at_pickup).await
}

// POST /driver/booking/startRide
pub async fn start_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<BookingIdRequest>,
) -> ApiResult<Booking> {
    step(&state, &actor, &req.booking_id, engine::start_ride).await
}

// POST /driver/booking/completeRide
pub async fn complete_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(req): ValidatedJson<BookingIdRequest>,
) -> ApiResult<Booking> {
    step(&state, &actor, &req.booking_id, engine::complete_ride).await
}
