//! Error types for relinfer

use std::time::Duration;

use thiserror::Error;

/// Result type alias using relinfer's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for a single remote fetch
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Failures at the remote graph service boundary
///
/// These are cloneable so a single failed fetch can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network or transport failure (connection refused, reset, 5xx)
    #[error("Remote graph service unavailable: {0}")]
    RemoteUnavailable(String),

    /// No response within the per-call deadline
    #[error("Remote graph service did not respond within {0:?}")]
    RemoteTimeout(Duration),

    /// Well-formed error answer, e.g. unknown term
    #[error("Remote graph service error ({status}): {message}")]
    RemoteError { status: u16, message: String },
}

impl FetchError {
    /// Whether this failure may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::RemoteTimeout(_))
    }
}

/// Relinfer error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Remote errors (E100-E199)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Cache errors (E700-E799)
    #[error("Cache snapshot error: {0}")]
    CacheSnapshot(String),

    // Query errors (E800-E899)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Deadline errors (E900-E999)
    #[error("Query did not complete within {0:?}")]
    QueryTimeout(Duration),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::RemoteUnavailable(_)) => "E100",
            Self::Fetch(FetchError::RemoteTimeout(_)) => "E101",
            Self::Fetch(FetchError::RemoteError { .. }) => "E102",
            Self::NetworkError(_) => "E103",
            Self::ConfigError(_) => "E600",
            Self::CacheSnapshot(_) => "E700",
            Self::InvalidQuery(_) => "E800",
            Self::InvalidInput(_) => "E801",
            Self::QueryTimeout(_) => "E900",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Fetch(FetchError::RemoteUnavailable(_)) | Self::NetworkError(_) => {
                Some("Check internet connection or `relinfer config get remote.base_url`".to_string())
            }
            Self::Fetch(FetchError::RemoteTimeout(_)) => {
                Some("relinfer config set remote.timeout_secs 30".to_string())
            }
            Self::QueryTimeout(_) => Some("relinfer config set search.query_timeout_secs 60".to_string()),
            Self::InvalidQuery(_) => Some("Check the spelling of both terms".to_string()),
            Self::ConfigError(_) => Some("relinfer config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error is a failure of the query itself (as opposed to
    /// the environment), used by renderers to pick wording
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::InvalidQuery(_) | Self::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::RemoteUnavailable("reset".to_string()).is_transient());
        assert!(FetchError::RemoteTimeout(Duration::from_secs(1)).is_transient());
        assert!(
            !FetchError::RemoteError {
                status: 404,
                message: "unknown term".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_fetch_error_codes() {
        let error: Error = FetchError::RemoteUnavailable("down".to_string()).into();
        assert_eq!(error.code(), "E100");
        assert!(error.suggestion().is_some());

        let error: Error = FetchError::RemoteTimeout(Duration::from_secs(2)).into();
        assert_eq!(error.code(), "E101");

        let error: Error = FetchError::RemoteError {
            status: 404,
            message: "nope".to_string(),
        }
        .into();
        assert_eq!(error.code(), "E102");
        assert_eq!(error.suggestion(), None);
    }

    #[test]
    fn test_invalid_query_error() {
        let error = Error::InvalidQuery("unknown term 'pizzza'".to_string());
        assert_eq!(error.code(), "E800");
        assert!(error.is_query_error());
        assert!(error.to_string().contains("pizzza"));
    }

    #[test]
    fn test_query_timeout_error() {
        let error = Error::QueryTimeout(Duration::from_secs(30));
        assert_eq!(error.code(), "E900");
        assert!(!error.is_query_error());
        assert!(error.to_string().contains("30s"));
    }

    #[test]
    fn test_fetch_error_display_is_transparent() {
        let inner = FetchError::RemoteError {
            status: 500,
            message: "boom".to_string(),
        };
        let error: Error = inner.clone().into();
        assert_eq!(error.to_string(), inner.to_string());
    }
}
