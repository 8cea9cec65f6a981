//! Error types for ReplyBox

use thiserror::Error;

/// Main error type for ReplyBox
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Mailbox provider API failure. `status` is the HTTP status when the
    /// provider answered at all.
    #[error("Provider error: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ReplyBox
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a provider error from an HTTP status and message
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Provider {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Provider { .. } => 502,
            Error::Auth(_) => 502,
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::Queue(_) => 500,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Provider { .. } => "PROVIDER_ERROR",
            Error::Auth(_) => "PROVIDER_AUTH_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Queue(_) => "QUEUE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// Rate limiting, provider-side 5xx and transport failures (no status)
    /// are transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Provider { status: None, .. } => true,
            Error::Provider {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            Error::Database(_) | Error::Queue(_) => true,
            _ => false,
        }
    }
}
