pub mod stripe;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Payment;
use crate::state::AppState;

/// Provider view of a payment intent. Amounts are in minor units.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub latest_charge: Option<String>,
    /// Customer the intent was created for, as tagged in provider metadata.
    pub customer_id: Option<String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    pub fn created_for(&self, customer_id: &str) -> bool {
        self.customer_id.as_deref() == Some(customer_id)
    }
}

/// Payment intent ids look like `pi_` followed by letters, digits or `_`.
pub fn is_intent_id(id: &str) -> bool {
    match id.strip_prefix("pi_") {
        Some(rest) => {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        customer_id: &str,
    ) -> anyhow::Result<PaymentIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<PaymentIntent>;
}

pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_minor_units(amount_minor: i64) -> f64 {
    amount_minor as f64 / 100.0
}

pub async fn create_payment_intent(
    state: &AppState,
    customer_id: &str,
    amount: f64,
) -> Result<PaymentIntent, AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::BadRequest(
            "Amount must be greater than 0".to_string(),
        ));
    }

    let intent = state
        .payments
        .create_intent(
            to_minor_units(amount),
            &state.config.payment_currency,
            customer_id,
        )
        .await
        .map_err(AppError::Upstream)?;

    tracing::info!(
        customer_id,
        intent_id = %intent.id,
        amount_minor = intent.amount_minor,
        "payment intent created"
    );
    Ok(intent)
}

/// Confirms an intent with the provider and records it once.
///
/// A second call with the same intent id returns the stored record without
/// contacting the provider again.
pub async fn verify_and_record_payment(
    state: &AppState,
    intent_id: &str,
    customer_id: &str,
) -> Result<Payment, AppError> {
    if !is_intent_id(intent_id) {
        return Err(AppError::BadRequest("Invalid payment intent id".to_string()));
    }

    let existing = {
        let db = state.db.lock().unwrap();
        queries::find_payment_by_intent(&db, intent_id)?
    };
    if let Some(payment) = existing {
        return owned_by(payment, customer_id);
    }

    let intent = state
        .payments
        .retrieve_intent(intent_id)
        .await
        .map_err(AppError::Upstream)?;

    if !intent.created_for(customer_id) {
        return Err(AppError::Forbidden(
            "Payment belongs to another customer".to_string(),
        ));
    }

    if !intent.succeeded() {
        return Err(AppError::BadRequest(format!(
            "Payment not completed. Status: {}",
            intent.status
        )));
    }

    let now = Utc::now().naive_utc();
    let payment = Payment {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        payment_intent_id: intent.id.clone(),
        amount: from_minor_units(intent.amount_minor),
        currency: intent.currency.to_uppercase(),
        payment_method: intent.payment_method.clone(),
        stripe_charge_id: intent.latest_charge.clone(),
        created_at: now,
        updated_at: now,
    };

    let stored = {
        let db = state.db.lock().unwrap();
        if queries::insert_payment(&db, &payment)? {
            tracing::info!(
                payment_id = %payment.id,
                intent_id,
                customer_id,
                amount = payment.amount,
                "payment recorded"
            );
        }
        queries::find_payment_by_intent(&db, &payment.payment_intent_id)?
    };

    match stored {
        Some(payment) => owned_by(payment, customer_id),
        None => Err(AppError::Internal(anyhow::anyhow!(
            "payment for intent {intent_id} missing after insert"
        ))),
    }
}

fn owned_by(payment: Payment, customer_id: &str) -> Result<Payment, AppError> {
    if payment.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "Payment belongs to another customer".to_string(),
        ));
    }
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_round() {
        assert_eq!(to_minor_units(12.5), 1250);
        assert_eq!(to_minor_units(19.999), 2000);
        assert_eq!(to_minor_units(0.01), 1);
        assert_eq!(from_minor_units(1250), 12.5);
    }

    #[test]
    fn test_intent_id_shape() {
        assert!(is_intent_id("pi_3Nx8Yz2eZvKYlo2C1a2b3c4d"));
        assert!(is_intent_id("pi_test_1"));
        assert!(!is_intent_id("pi_"));
        assert!(!is_intent_id("ch_123"));
        assert!(!is_intent_id("pi_123/../../v1/customers"));
        assert!(!is_intent_id("pi_123?expand[]=customer"));
    }

    #[test]
    fn test_intent_created_for() {
        let intent = PaymentIntent {
            id: "pi_1".to_string(),
            client_secret: None,
            status: "succeeded".to_string(),
            amount_minor: 500,
            currency: "usd".to_string(),
            payment_method: None,
            latest_charge: None,
            customer_id: Some("cust-a".to_string()),
        };
        assert!(intent.created_for("cust-a"));
        assert!(!intent.created_for("cust-b"));
        assert!(!PaymentIntent {
            customer_id: None,
            ..intent
        }
        .created_for("cust-a"));
    }
}
