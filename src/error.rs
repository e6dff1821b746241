//! Error types for apikit
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for apikit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Identity Cache Errors
    // ============================================================================
    #[error("Invalid entity key: {message}")]
    InvalidKey { message: String },

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error("Invalid or missing cursor - check has_next/has_previous before navigating")]
    InvalidCursor,

    #[error("Page at '{url}' does not contain an array of items")]
    NotArray { url: String },

    // ============================================================================
    // Request Errors
    // ============================================================================
    /// A non-successful final response, after all retries were exhausted
    /// or disabled.
    #[error("Request to {url} failed: {messages}")]
    Request {
        status: i32,
        status_text: String,
        url: String,
        messages: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid-key error
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Create a not-array error
    pub fn not_array(url: impl Into<String>) -> Self {
        Self::NotArray { url: url.into() }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Request { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// The final HTTP status carried by this error, if any
    pub fn status(&self) -> Option<i32> {
        match self {
            Error::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: i32) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for apikit
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_key("id field was null");
        assert_eq!(err.to_string(), "Invalid entity key: id field was null");

        let err = Error::not_array("https://api.example.com/v1/items");
        assert_eq!(
            err.to_string(),
            "Page at 'https://api.example.com/v1/items' does not contain an array of items"
        );

        let err = Error::Request {
            status: 400,
            status_text: "Bad Request".to_string(),
            url: "https://users.example.com/v1/users".to_string(),
            messages: "Invalid birthday".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request to https://users.example.com/v1/users failed: Invalid birthday"
        );
    }

    #[test]
    fn test_is_retryable() {
        let rate_limited = Error::Request {
            status: 429,
            status_text: "Too Many Requests".to_string(),
            url: String::new(),
            messages: String::new(),
        };
        assert!(rate_limited.is_retryable());

        let server_error = Error::Request {
            status: 502,
            status_text: "Bad Gateway".to_string(),
            url: String::new(),
            messages: String::new(),
        };
        assert!(server_error.is_retryable());

        let client_error = Error::Request {
            status: 404,
            status_text: "Not Found".to_string(),
            url: String::new(),
            messages: String::new(),
        };
        assert!(!client_error.is_retryable());

        assert!(!Error::InvalidCursor.is_retryable());
        assert!(!Error::invalid_key("null").is_retryable());
    }

    #[test]
    fn test_error_status() {
        let err = Error::Request {
            status: 403,
            status_text: "Forbidden".to_string(),
            url: String::new(),
            messages: String::new(),
        };
        assert_eq!(err.status(), Some(403));
        assert_eq!(Error::InvalidCursor.status(), None);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::decode("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Failed to decode response: inner"));
    }
}
