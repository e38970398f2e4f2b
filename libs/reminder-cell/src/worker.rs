use std::sync::Arc;
use std::time::Duration;

use shared_config::AppConfig;
use shared_database::StoreClient;
use tokio::task::JoinHandle;

use crate::services::mail::MailGatewayClient;
use crate::services::notifier::ReminderService;
use crate::services::sms::SmsGatewayClient;

/// Spawns the background reminder loop. Returns `None` when the mail or SMS
/// gateway is not configured; the API still serves without reminders.
pub fn spawn(config: Arc<AppConfig>) -> Option<JoinHandle<()>> {
    if !config.is_mail_configured() || !config.is_sms_configured() {
        tracing::warn!("reminder gateways not configured, reminder worker disabled");
        return None;
    }

    let store = Arc::new(StoreClient::new(
        config.store_url.clone(),
        config.store_service_key.clone(),
    ));
    let mail = MailGatewayClient::new(
        config.mail_gateway_url.clone(),
        config.mail_gateway_token.clone(),
        config.mail_from_address.clone(),
    );
    let sms = SmsGatewayClient::new(
        config.sms_gateway_url.clone(),
        config.sms_gateway_token.clone(),
        config.sms_from_number.clone(),
    );
    let service = ReminderService::new(store, mail, sms, config.reminder_lead_minutes);
    let poll_seconds = config.reminder_poll_seconds;

    Some(tokio::spawn(async move {
        tracing::info!(poll_seconds, "reminder worker started");
        let mut ticker = tokio::time::interval(Duration::from_secs(poll_seconds));
        loop {
            ticker.tick().await;
            service.run_tick().await;
        }
    }))
}
