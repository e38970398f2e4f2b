pub mod mail;
pub mod notifier;
pub mod sms;

pub use notifier::ReminderService;
