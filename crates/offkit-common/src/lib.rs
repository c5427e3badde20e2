//! # Offkit Common
//!
//! Common error types and logging configuration for the Offkit offline
//! worker engine.
//!
//! ## Features
//!
//! - Unified error type with source chaining
//! - Logging configuration and setup
//! - Result extension traits

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for Offkit.
#[derive(Error, Debug)]
pub enum OffkitError {
    /// Install-phase errors (precache failures).
    #[error("Install error: {message}")]
    Install {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Activation-phase errors (stale-store cleanup, claiming).
    #[error("Activation error: {message}")]
    Activation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache storage errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Lifecycle state errors (event fired in the wrong state).
    #[error("Lifecycle error: {message}")]
    Lifecycle {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl OffkitError {
    /// Create an install error.
    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
            source: None,
        }
    }

    /// Create an install error with source.
    pub fn install_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Install {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an activation error.
    pub fn activation(message: impl Into<String>) -> Self {
        Self::Activation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a lifecycle error.
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Get the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            OffkitError::Install { .. } => "install",
            OffkitError::Activation { .. } => "activation",
            OffkitError::Cache { .. } => "cache",
            OffkitError::Network { .. } => "network",
            OffkitError::Lifecycle { .. } => "lifecycle",
            OffkitError::Config { .. } => "config",
            OffkitError::NotFound(_) => "not_found",
            OffkitError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Result type alias for Offkit operations.
pub type Result<T> = std::result::Result<T, OffkitError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Add cache-error context to an error.
    fn cache_context(self, message: impl Into<String>) -> Result<T>;

    /// Add network-error context to an error.
    fn network_context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn cache_context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| OffkitError::Cache {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn network_context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| OffkitError::Network {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }
}

/// Extension trait for Option.
pub trait OptionExt<T> {
    /// Convert None to a NotFound error.
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| OffkitError::NotFound(resource.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(OffkitError::install("test").category(), "install");
        assert_eq!(OffkitError::network("test").category(), "network");
        assert_eq!(
            OffkitError::NotFound("x".to_string()).category(),
            "not_found"
        );
    }

    #[test]
    fn test_source_chaining() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = OffkitError::network_with_source("fetch failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_result_ext() {
        let r: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = r.cache_context("opening store").unwrap_err();
        assert_eq!(err.category(), "cache");
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("test").unwrap(), 42);

        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_not_found("test"),
            Err(OffkitError::NotFound(_))
        ));
    }
}
