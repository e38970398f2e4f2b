pub mod models;
pub mod services;
pub mod worker;

pub use models::*;
pub use services::notifier::ReminderService;
