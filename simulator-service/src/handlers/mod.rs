pub mod chat;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod status;

use service_core::error::AppError;

use crate::conversation::SessionError;
use crate::services::RelayError;

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::EmptyMessage => AppError::BadRequest(anyhow::anyhow!(err)),
            SessionError::Busy
            | SessionError::NotStarted
            | SessionError::AlreadyStarted
            | SessionError::Closed => AppError::Conflict(anyhow::anyhow!(err)),
        }
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::EmptyMessage => AppError::BadRequest(anyhow::anyhow!(err)),
            RelayError::NotConfigured(_) => {
                AppError::ConfigError(anyhow::anyhow!("Model credential not configured"))
            }
            other => AppError::UpstreamError(other.to_string()),
        }
    }
}
