use std::time::Duration;

use serde_json::json;

use crate::models::ReminderError;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Thin client for the outbound SMS gateway.
pub struct SmsGatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    from_number: String,
}

impl SmsGatewayClient {
    pub fn new(base_url: String, token: String, from_number: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            token,
            from_number,
        }
    }

    pub async fn send_sms(&self, to: &str, body_text: &str) -> Result<(), ReminderError> {
        let body = json!({
            "from": self.from_number,
            "to": to,
            "body": body_text,
        });

        match self.send_once(&body).await {
            Err(e) if e.is_timeout() || e.is_connect() => {
                tracing::warn!(error = %e, "sms gateway request failed, retrying once");
                self.send_once(&body)
                    .await
                    .map_err(|e| ReminderError::Gateway(e.to_string()))?;
            }
            Err(e) => return Err(ReminderError::Gateway(e.to_string())),
            Ok(()) => {}
        }
        Ok(())
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<(), reqwest::Error> {
        self.client
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
