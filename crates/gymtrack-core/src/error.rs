//! Error taxonomy surfaced to session consumers.
//!
//! Screens only need to know which of a handful of outcomes happened and
//! what to show the user; transport details stay in [`ApiError`].

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    /// No usable response (connection failure, timeout, garbled payload).
    /// Retryable by user action.
    #[error("Network error: {0}")]
    Network(String),

    /// Sign-in rejected by the backend.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The backend answered with a `{ message }` body; carries that message.
    #[error("{0}")]
    Validation(String),

    /// Session expired and could not be refreshed.
    #[error("Session expired - please sign in again")]
    Unauthenticated,

    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Message for a transient notification: the server's text when it sent
    /// one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Error::InvalidCredentials(message) | Error::Validation(message) => message.clone(),
            Error::Unauthenticated => self.to_string(),
            Error::Network(_) | Error::Storage(_) => fallback.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// True when the consumer must route the user back to sign-in.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Error::Unauthenticated)
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => Error::Unauthenticated,
            // Any status that came with a `{ message }` body is shown as-is
            ApiError::Rejected { message, .. } => Error::Validation(message),
            other => Error::Network(other.to_string()),
        }
    }
}
