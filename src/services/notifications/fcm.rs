use anyhow::Context;
use async_trait::async_trait;

use super::PushProvider;

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

pub struct FcmPushProvider {
    server_key: String,
    client: reqwest::Client,
}

impl FcmPushProvider {
    pub fn new(server_key: String) -> Self {
        Self {
            server_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    async fn send(&self, token: &str, title: &str, body: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "to": token,
            "notification": {
                "title": title,
                "body": body,
            },
        });

        self.client
            .post(FCM_SEND_URL)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await
            .context("failed to reach FCM")?
            .error_for_status()
            .context("FCM returned error")?;

        Ok(())
    }
}

/// Used when no FCM key is configured.
pub struct LogPushProvider;

#[async_trait]
impl PushProvider for LogPushProvider {
    async fn send(&self, token: &str, title: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(token, title, body, "push notification (log only)");
        Ok(())
    }
}
