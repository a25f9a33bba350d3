use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::notifications::PushProvider;
use crate::services::otp::OtpDelivery;
use crate::services::payments::PaymentProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub payments: Box<dyn PaymentProvider>,
    pub push: Box<dyn PushProvider>,
    pub otp_delivery: Box<dyn OtpDelivery>,
}
