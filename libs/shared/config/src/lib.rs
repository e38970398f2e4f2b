use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_service_key: String,
    pub jwt_secret: String,
    pub mail_gateway_url: String,
    pub mail_gateway_token: String,
    pub mail_from_address: String,
    pub sms_gateway_url: String,
    pub sms_gateway_token: String,
    pub sms_from_number: String,
    pub reminder_lead_minutes: i64,
    pub reminder_poll_seconds: u64,
    pub port: u16,
}

fn env_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env_or_empty("STORE_URL"),
            store_service_key: env_or_empty("STORE_SERVICE_KEY"),
            jwt_secret: env_or_empty("JWT_SECRET"),
            mail_gateway_url: env_or_empty("MAIL_GATEWAY_URL"),
            mail_gateway_token: env_or_empty("MAIL_GATEWAY_TOKEN"),
            mail_from_address: env_or_empty("MAIL_FROM_ADDRESS"),
            sms_gateway_url: env_or_empty("SMS_GATEWAY_URL"),
            sms_gateway_token: env_or_empty("SMS_GATEWAY_TOKEN"),
            sms_from_number: env_or_empty("SMS_FROM_NUMBER"),
            reminder_lead_minutes: env::var("REMINDER_LEAD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            reminder_poll_seconds: env::var("REMINDER_POLL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// The minimum needed to serve requests. The API refuses to start without it.
    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty()
            && !self.store_service_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        !self.mail_gateway_url.is_empty()
            && !self.mail_gateway_token.is_empty()
            && !self.mail_from_address.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_gateway_url.is_empty()
            && !self.sms_gateway_token.is_empty()
            && !self.sms_from_number.is_empty()
    }
}
