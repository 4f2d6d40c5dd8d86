//! Error types for the Polaris SDK

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the SDK
pub type Result<T> = std::result::Result<T, PolarisError>;

#[derive(Error, Debug)]
pub enum PolarisError {
    #[error("Required credentials are missing: {0}")]
    MissingCredentials(String),

    #[error("Missing configuration: rubrik_{0} not defined in the environment.")]
    MissingConfig(String),

    #[error("{0}")]
    Authentication(String),

    #[error("Failed request to Polaris, got {message}({code}) on {path}")]
    GraphQl {
        message: String,
        code: String,
        path: String,
    },

    #[error("{message}")]
    Api { code: u16, message: String },

    #[error("API request failed: {status}")]
    Http { status: reqwest::StatusCode },

    #[error("{0}")]
    Validation(String),

    #[error("query_name not found : {0}")]
    UnknownQuery(String),

    #[error("invalid GraphQL document for '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("task chain {id} did not reach a terminal state within {timeout:?}")]
    TaskTimeout { id: String, timeout: Duration },

    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: Box<PolarisError>,
    },

    #[error("GCP error: {0}")]
    Gcp(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolarisError {
    /// Shorthand for argument validation failures
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(status.as_u16()),
            Self::Api { code, .. } => Some(*code),
            Self::Operation { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

/// Attach an operation description to an error
pub trait ResultExt<T> {
    fn operation(self, context: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn operation(self, context: &str) -> Result<T> {
        self.map_err(|source| PolarisError::Operation {
            context: context.to_string(),
            source: Box::new(source),
        })
    }
}
