//! Error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Authorization request failed: {0}")]
    AuthorizationRequestFailed(String),

    #[error("Provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Message shown to the person at the keyboard: terminal popup pages and
    /// CLI alerts. Handshake failures surface the backend or provider detail
    /// verbatim; everything else falls back to the Display form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "You need to sign in first.".to_string(),
            Self::ProviderDenied(code) => {
                format!("The provider denied the authorization request ({code})")
            }
            Self::ProtocolViolation(message) => message.clone(),
            Self::ExchangeFailed(detail) => detail.clone(),
            Self::Transport(detail) => format!("Could not reach the backend: {detail}"),
            other => other.to_string(),
        }
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
