//! Error types for the Faculty platform SDK

use thiserror::Error;

/// Result type alias using the SDK Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by the REST clients and the datasets layer
#[derive(Error, Debug)]
pub enum Error {
    // Response decoding errors
    #[error("Schema error: {message}")]
    Schema { message: String },

    // Caller arguments inconsistent with filesystem semantics
    #[error("Datasets error: {message}")]
    Datasets { message: String },

    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },

    // Object store errors
    #[error("Object not found: {path}")]
    ObjectNotFound { path: String },

    #[error("Object store error: {message}")]
    ObjectStore { message: String },

    // Transport errors
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Could not resolve project: {message}")]
    ProjectResolution { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `Datasets` validation error
    pub fn datasets(message: impl Into<String>) -> Self {
        Error::Datasets {
            message: message.into(),
        }
    }

    /// Build a `Schema` error
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema {
            message: message.into(),
        }
    }

    /// Returns true if the server response could not be decoded
    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema { .. })
    }

    /// Returns true if the error was raised locally from caller arguments,
    /// before any request was issued
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Datasets { .. } | Error::NotImplemented { .. } | Error::InvalidConfig { .. }
        )
    }

    /// Returns true if the addressed object or HTTP resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ObjectNotFound { .. } => true,
            Error::Http { status, .. } => *status == 404,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Schema {
            message: e.to_string(),
        }
    }
}
