use crate::models::PricingError;

/// Service-level error types.
/// Pricing failures are carried through untouched so the HTTP layer can
/// report the exact validation reason.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl ServiceError {
    /// Stable machine-readable tag used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "database",
            ServiceError::Config(_) => "config",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::Pricing(e) => e.kind(),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(e: rusqlite::Error) -> Self {
        ServiceError::Database(e.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Database(e.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
