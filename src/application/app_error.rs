use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Payment gateway is unavailable")]
    GatewayUnavailable,

    #[error("Payment gateway timed out")]
    GatewayTimeout,

    #[error("Invalid phone number or network: {0}")]
    InvalidPhoneOrNetwork(String),

    #[error("No subscription found")]
    SubscriptionNotFound,

    #[error("Transaction reference not found")]
    ReferenceNotFound,

    /// Optimistic-concurrency loss. Internal only: callers retry their
    /// read-modify-write and never surface this to the client.
    #[error("Concurrent update conflict")]
    ConcurrentUpdate,

    #[error("Temporarily unavailable, retry later")]
    TemporarilyUnavailable,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    GatewayUnavailable,
    GatewayTimeout,
    InvalidPhoneOrNetwork,
    SubscriptionNotFound,
    ReferenceNotFound,
    TemporarilyUnavailable,
    InvalidInput,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::GatewayUnavailable => "GATEWAY_UNAVAILABLE",
            ErrorCode::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorCode::InvalidPhoneOrNetwork => "INVALID_PHONE_OR_NETWORK",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::ReferenceNotFound => "REFERENCE_NOT_FOUND",
            ErrorCode::TemporarilyUnavailable => "TEMPORARILY_UNAVAILABLE",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
