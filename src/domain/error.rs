//! Domain-level error types for campus-market.
//!
//! All errors are typed with `thiserror`. The variants split along the lines
//! the retry wrapper and the session guard care about: whether a structured
//! HTTP response exists, and which status it carried.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Stored token is missing or cannot be decoded.
    #[error("Token decode error: {message}")]
    Decode { message: String },

    /// Token refresh or login was rejected.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Request never produced a response (connect, timeout, reset).
    #[error("Network error: {message}")]
    TransientNetwork {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// 4xx response.
    #[error("Request rejected with status {status}: {detail}")]
    Client { status: u16, detail: String },

    /// 5xx response.
    #[error("Server error {status}: {detail}")]
    Server { status: u16, detail: String },

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {message}")]
    InvalidResponse { message: String },

    /// Input rejected before any request was made.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Local token database failed.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl AppError {
    /// Create a storage error from a rusqlite error.
    pub fn storage(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Map an HTTP status and body to `Client` or `Server`.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if status >= 500 {
            Self::Server { status, detail }
        } else {
            Self::Client { status, detail }
        }
    }

    /// HTTP status carried by the error, if a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the retry wrapper may try again.
    ///
    /// Only failures without a response, and 500/503 responses, qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::TransientNetwork { .. } => true,
            Self::Server { status, .. } => matches!(*status, 500 | 503),
            _ => false,
        }
    }

    /// Message suitable for showing to the person at the terminal.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Client { status: 401, .. } | Self::Auth { .. } => {
                "You need to be logged in to do that.".to_string()
            }
            Self::Client { status: 403, .. } => {
                "You are not allowed to do that.".to_string()
            }
            Self::Client { status: 404, .. } => "Not found.".to_string(),
            Self::Client { status: 409, .. } => {
                "This listing is already in your favorites!".to_string()
            }
            Self::Client { status, detail } if detail.is_empty() => {
                format!("Something went wrong! Status code: {status}")
            }
            Self::Client { status, detail } => {
                format!("Something went wrong! Status code: {status} ({detail})")
            }
            Self::Server { status, .. } => {
                format!("The server failed to handle the request (status {status}). Please try again later.")
            }
            Self::TransientNetwork { .. } => {
                "Unable to reach the server. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
