/*!
 * Error types for the bookwai application.
 *
 * The taxonomy follows the three failure domains of a translation run:
 * - `LoadError`: the document cannot be read or parsed, the document is skipped
 * - `ProviderError`: the AI backend failed, retried per unit when transient
 * - `PersistenceError`: checkpoint or output cannot be written, fatal for the document
 */

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Message from the API
        message: String,
        /// Delay requested by the server through `Retry-After`
        retry_after: Option<Duration>,
    },

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider answered without any usable text
    #[error("Provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether retrying the same request later can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. }
            | Self::Timeout(_)
            | Self::ConnectionError(_)
            | Self::EmptyResponse => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::RequestFailed(_) | Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }

    /// Server-requested delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Map an HTTP error status and body to the matching variant
    pub fn from_status(status_code: u16, message: String, retry_after: Option<Duration>) -> Self {
        match status_code {
            429 => Self::RateLimitExceeded { message, retry_after },
            401 | 403 => Self::AuthenticationError(message),
            408 => Self::Timeout(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that can occur while loading or reassembling a document
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file extension does not map to a known format
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the document
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The container (zip) is missing or damaged
    #[error("Corrupt container: {0}")]
    Container(String),

    /// The XML/XHTML payload could not be parsed
    #[error("Malformed markup in {part}: {message}")]
    Markup {
        /// Archive member or file being parsed
        part: String,
        /// Parser message
        message: String,
    },

    /// The text payload is not valid UTF-8
    #[error("Document is not valid UTF-8: {0}")]
    Encoding(String),
}

impl From<zip::result::ZipError> for LoadError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Container(error.to_string())
    }
}

/// Errors that can occur when persisting progress or output
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database access failed
    #[error("Checkpoint database error: {0}")]
    Database(String),

    /// Writing a file failed
    #[error("Failed to write {path}: {message}")]
    Write {
        /// Destination path
        path: String,
        /// Failure description
        message: String,
    },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database(error.to_string())
    }
}

impl From<anyhow::Error> for PersistenceError {
    fn from(error: anyhow::Error) -> Self {
        Self::Database(format!("{:#}", error))
    }
}

/// Errors that abort the translation of a single document
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error while loading the document
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Error while persisting progress
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors reported by the command line front end
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Some documents were skipped or could not be saved
    #[error("{failed} of {total} document(s) could not be translated")]
    Incomplete { failed: usize, total: usize },
}
