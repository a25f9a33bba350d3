use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{is_intent_id, PaymentIntent, PaymentProvider};

pub struct StripePaymentProvider {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripePaymentProvider {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
    payment_method: Option<String>,
    latest_charge: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl From<StripeIntent> for PaymentIntent {
    fn from(intent: StripeIntent) -> Self {
        Self {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            amount_minor: intent.amount,
            currency: intent.currency,
            payment_method: intent.payment_method,
            latest_charge: intent.latest_charge,
            customer_id: intent.metadata.get("customerId").cloned(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        customer_id: &str,
    ) -> anyhow::Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let amount = amount_minor.to_string();
        let currency = currency.to_lowercase();

        let intent: StripeIntent = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", currency.as_str()),
                ("automatic_payment_methods[enabled]", "true"),
                ("metadata[customerId]", customer_id),
            ])
            .send()
            .await
            .context("failed to reach Stripe")?
            .error_for_status()
            .context("Stripe API returned error")?
            .json()
            .await
            .context("failed to parse Stripe payment intent")?;

        Ok(intent.into())
    }

    async fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<PaymentIntent> {
        anyhow::ensure!(is_intent_id(intent_id), "malformed payment intent id: {intent_id}");
        let url = format!("{}/v1/payment_intents/{}", self.api_base, intent_id);

        let intent: StripeIntent = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to reach Stripe")?
            .error_for_status()
            .context("Stripe API returned error")?
            .json()
            .await
            .context("failed to parse Stripe payment intent")?;

        Ok(intent.into())
    }
}
