//! Error taxonomy for the request pipeline.
//!
//! Every completed request maps to exactly one [`ApiError`] kind, derived
//! strictly from the HTTP status or transport failure. The display strings
//! double as the user-facing notification text; validation errors carry the
//! server's field message and are never notified at this layer, because the
//! submitting form renders its own feedback.

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;
use crate::persist::PersistError;

/// A classified request failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 401. Triggers session invalidation in the pipeline.
    #[error("Session expired. Please login again.")]
    Unauthorized,

    /// HTTP 403.
    #[error("Access denied. You do not have permission to perform this action.")]
    Forbidden,

    /// HTTP 404.
    #[error("Resource not found.")]
    NotFound,

    /// HTTP 429.
    #[error("Too many requests. Please try again later.")]
    RateLimited,

    /// HTTP 5xx.
    #[error("Server error. Please try again later.")]
    Server {
        /// The exact status received.
        status: u16,
    },

    /// Transport failure other than a timeout.
    #[error("Network error. Please check your connection.")]
    Network(#[source] reqwest::Error),

    /// The fixed per-request timeout elapsed.
    #[error("Network error. Please check your connection.")]
    Timeout,

    /// HTTP 400. Suppressed at the pipeline level; the message is the
    /// server's field-level feedback for the calling form.
    #[error("{message}")]
    Validation {
        /// Server-provided validation message.
        message: String,
    },

    /// Any other outcome.
    #[error("{message}")]
    Unknown {
        /// The status received, if the response completed.
        status: Option<u16>,
        /// Server message, or a generic fallback.
        message: String,
    },
}

impl ApiError {
    /// Classify a completed non-success response.
    ///
    /// Pure: no side effects belong here. `message` is the server's error
    /// body message, when one was parseable.
    #[must_use]
    pub fn classify(status: StatusCode, message: Option<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            StatusCode::BAD_REQUEST => Self::Validation {
                message: message.unwrap_or_else(|| "Invalid input.".to_string()),
            },
            s if s.is_server_error() => Self::Server { status: s.as_u16() },
            s => Self::Unknown {
                status: Some(s.as_u16()),
                message: message.unwrap_or_else(|| "Something went wrong".to_string()),
            },
        }
    }

    /// Classify a transport failure.
    #[must_use]
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }

    /// Whether the pipeline should surface this error as a notification.
    ///
    /// Validation failures are excluded: the calling form owns that
    /// feedback. Unauthorized is excluded here because its notification is
    /// part of the deduplicated invalidation side effect.
    #[must_use]
    pub const fn is_notifiable(&self) -> bool {
        !matches!(self, Self::Validation { .. } | Self::Unauthorized)
    }
}

/// Errors constructing an [`crate::AppContext`].
#[derive(Debug, Error)]
pub enum InitError {
    /// Configuration loading failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The durable state directory is unusable.
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}
