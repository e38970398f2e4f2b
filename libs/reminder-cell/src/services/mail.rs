use std::time::Duration;

use serde_json::json;

use crate::models::ReminderError;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Thin client for the outbound email gateway.
pub struct MailGatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    from_address: String,
}

impl MailGatewayClient {
    pub fn new(base_url: String, token: String, from_address: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            token,
            from_address,
        }
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text: &str,
    ) -> Result<(), ReminderError> {
        let body = json!({
            "from": self.from_address,
            "to": to,
            "subject": subject,
            "text": text,
        });

        match self.send_once(&body).await {
            Err(e) if e.is_timeout() || e.is_connect() => {
                tracing::warn!(error = %e, "email gateway request failed, retrying once");
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
