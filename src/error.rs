//! Error handling for the analyzer controller
//!
//! This module defines the error taxonomy shared by every layer of the crate
//! and a Result alias for use throughout the library.

use crate::types::Channel;
use thiserror::Error;

/// Main error type for analyzer operations
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Transport failure: malformed reply, timeout or disconnect
    #[error("Device communication error: {0}")]
    Communication(String),

    /// A caller supplied a value outside its documented range.
    ///
    /// Raised before any command reaches the device.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Auto-ranging walked past the most sensitive level without an overload
    #[error("Sensitivity for channel {channel} went out of bounds (level {level})")]
    RangingBoundsExceeded { channel: Channel, level: u8 },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to writing export files
    #[error("Export error: {0}")]
    Export(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalyzerError>,
    },
}

impl AnalyzerError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalyzerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &AnalyzerError {
        match self {
            AnalyzerError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this is a transport level failure
    pub fn is_communication(&self) -> bool {
        matches!(self.root(), AnalyzerError::Communication(_))
    }

    /// Whether the caller passed a bad value (no device state was touched)
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self.root(), AnalyzerError::InvalidParameter(_))
    }
}

impl From<serialport::Error> for AnalyzerError {
    fn from(err: serialport::Error) -> Self {
        AnalyzerError::Communication(err.to_string())
    }
}

impl From<csv::Error> for AnalyzerError {
    fn from(err: csv::Error) -> Self {
        AnalyzerError::Export(err.to_string())
    }
}

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyzerError::InvalidParameter("SP must be 1-14".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: SP must be 1-14");
    }

    #[test]
    fn test_error_with_context() {
        let err = AnalyzerError::Communication("no reply".to_string());
        let with_ctx = err.with_context("Failed to read trace");
        assert!(with_ctx.to_string().contains("Failed to read trace"));
        assert!(with_ctx.is_communication());
    }

    #[test]
    fn test_ranging_error_names_channel() {
        let err = AnalyzerError::RangingBoundsExceeded {
            channel: Channel::B,
            level: 11,
        };
        assert!(err.to_string().contains("channel B"));
        assert!(err.to_string().contains("11"));
    }

    #[test]
    fn test_root_unwraps_nested_context() {
        let err = AnalyzerError::InvalidParameter("MD".into())
            .with_context("inner")
            .with_context("outer");
        assert!(err.is_invalid_parameter());
        assert!(!err.is_communication());
    }
}
