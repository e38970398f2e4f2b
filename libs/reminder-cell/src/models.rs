#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Gateway error: {0}")]
    Gateway(String),
    #[error("Database error: {0}")]
    Database(String),
}
