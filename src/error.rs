//! Error handling for the tessera engine
//!
//! This module defines the crate-wide error type and a Result alias used
//! throughout the library.

use thiserror::Error;

/// Main error type for tessera operations
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Errors raised while validating or compiling a pipeline graph
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    /// Errors related to session state and persistence
    #[error("Session error: {0}")]
    Session(String),

    /// Errors related to geometry file reading and writing
    #[error("Format error: {0}")]
    Format(String),

    /// Errors raised by a geometry operation kernel
    #[error("Operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary session archive encoding errors
    #[error("Session encode error: {0}")]
    SessionEncode(#[from] ciborium::ser::Error<std::io::Error>),

    /// Binary session archive decoding errors
    #[error("Session decode error: {0}")]
    SessionDecode(#[from] ciborium::de::Error<std::io::Error>),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TesseraError>,
    },
}

impl TesseraError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TesseraError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

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

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TesseraError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TesseraError::from(e).with_context(f()))
    }
}
