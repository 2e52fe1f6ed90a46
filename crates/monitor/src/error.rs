use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Alert {0} not found")]
    AlertNotFound(Uuid),

    #[error("Notification sink error: {0}")]
    Sink(String),
}
