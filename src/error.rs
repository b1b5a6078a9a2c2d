use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The identity provider rejected the credentials or token.
    #[error("Authentication failed: {0}")]
    AuthenticationRejected(String),

    /// The remote service could not be reached.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// An opaque upstream failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// An operation that needs a session was attempted without one.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Local key-value storage could not be read or written.
    #[error("Storage access failed: {0}")]
    StorageAccessFailed(String),

    /// A client-side validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single-row read matched nothing.
    #[error("Resource not found")]
    NotFound,
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

/// A modal notification shown to the user when an action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub title: &'static str,
    pub message: &'static str,
}

impl AppError {
    /// Maps the error to the static alert a screen presents, logging it on the way.
    pub fn alert(&self) -> Alert {
        let message = match self {
            AppError::AuthenticationRejected(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                "Invalid email or password."
            }

            AppError::NetworkUnavailable(msg) => {
                tracing::warn!("Network unavailable: {}", msg);
                "Could not reach the server. Check your connection and try again."
            }

            AppError::Provider(msg) => {
                tracing::error!("Provider error: {}", msg);
                "Something went wrong on our side. Please try again."
            }

            AppError::NotAuthenticated => {
                tracing::warn!("Operation attempted without a session");
                "Your session has ended. Please sign in again."
            }

            AppError::StorageAccessFailed(msg) => {
                tracing::error!("Storage access failed: {}", msg);
                "Could not access local storage on this device."
            }

            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                "Please check the highlighted fields and try again."
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                "The requested item no longer exists."
            }
        };

        Alert {
            title: "Error",
            message,
        }
    }

    /// Returns true when the failure came from the transport rather than the provider.
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::NetworkUnavailable(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            AppError::NetworkUnavailable(e.to_string())
        } else if e.is_decode() {
            AppError::Provider(format!("Malformed response: {}", e))
        } else {
            AppError::Provider(e.to_string())
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}
