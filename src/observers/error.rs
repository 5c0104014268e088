//! Unified error type for all observers.
//!
//! This module provides a unified [`ObserverError`] type that wraps errors
//! from all observer implementations, so client code can switch between
//! observers without changing its error handling.

use thiserror::Error;

/// Unified error type for all observer operations.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// Error from the JSON observer.
    #[cfg(feature = "json")]
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error encoding to UTF-8.
    #[error("utf8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic rendering error.
    #[error("render error: {0}")]
    Render(String),
}

/// Result type for observer operations.
pub type Result<T> = std::result::Result<T, ObserverError>;
