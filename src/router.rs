use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, customer, driver, health, notifications};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/auth/sendOtp", post(admin::send_otp))
        .route("/auth/verifyOtp", post(admin::verify_otp))
        .route("/driver/addRecord", post(admin::add_driver))
        .route("/driver/getAll", post(admin::get_drivers))
        .route("/driver/getById", post(admin::get_driver))
        .route("/driver/updateRecord", post(admin::update_driver))
        .route("/driver/deleteById", post(admin::delete_driver))
        .route("/customer/getAll", post(admin::get_customers))
        .route("/customer/getById", post(admin::get_customer))
        .route("/customer/updateRecord", post(admin::update_customer))
        .route("/customer/deleteById", post(admin::delete_customer))
        .route("/booking/getAll", get(admin::get_bookings))
        .route("/booking/getById", get(admin::get_booking))
        .route(
            "/booking/assignDriverAndSetPrice",
            post(admin::assign_driver_and_set_price),
        )
        .route("/booking/reject", post(admin::reject_booking));

    let customer_routes = Router::new()
        .route("/profile/signup", post(customer::signup))
        .route("/profile/login", post(customer::login))
        .route("/profile/postFcmToken", post(customer::post_fcm_token))
        .route("/profile/updateProfile", post(customer::update_profile))
        .route("/booking/submitRequest", post(customer::submit_request))
        .route("/booking/acceptQuote", post(customer::accept_quote))
        .route("/booking/cancel", post(customer::cancel))
        .route("/booking/byCustomer", get(customer::by_customer))
        .route("/payment/createIntent", post(customer::create_intent))
        .route("/payment/history", get(customer::payment_history));

    let driver_routes = Router::new()
        .route("/profile/login", post(driver::login))
        .route(
            "/booking/getAssignedRides",
            get(driver::get_assigned_rides).post(driver::get_assigned_rides),
        )
        .route(
            "/booking/startHeadingToPickup",
            post(driver::start_heading_to_pickup),
        )
        .route(
            "/booking/markArrivedAtPickup",
            post(driver::mark_arrived_at_pickup),
        )
        .route("/booking/startRide", post(driver::start_ride))
        .route("/booking/completeRide", post(driver::complete_ride));

    Router::new()
        .route("/health", get(health::health))
        .route("/notifications", get(notifications::list))
        .route("/notifications/markRead", post(notifications::mark_read))
        .nest("/admin", admin_routes)
        .nest("/customer", customer_routes)
        .nest("/driver", driver_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
