//! Error types for servd

use thiserror::Error;

/// Main error type for servd
#[derive(Error, Debug)]
pub enum ServdError {
    /// A required environment or spec value is absent or malformed
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// The port allocation table could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A direct model configuration call to a backing server failed
    #[error("Backing server {address} rejected model configuration: {message}")]
    BackingServerConfig { address: String, message: String },

    /// The hardware sidecar did not report ready
    #[error("Sidecar not ready: {0}")]
    SidecarNotReady(String),

    /// Bootstrap file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Spec retrieval error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serving runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for servd operations
pub type ServdResult<T> = Result<T, ServdError>;

impl From<serde_json::Error> for ServdError {
    fn from(err: serde_json::Error) -> Self {
        ServdError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ServdError {
    fn from(err: toml::de::Error) -> Self {
        ServdError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServdError::MissingConfiguration("SERVD_SERVING_PORT".to_string());
        assert_eq!(err.to_string(), "Missing configuration: SERVD_SERVING_PORT");

        let err = ServdError::BackingServerConfig {
            address: "localhost:9001".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Backing server localhost:9001 rejected model configuration: connection refused"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ServdError = io_err.into();
        assert!(matches!(err, ServdError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ServdError = json_err.into();
        assert!(matches!(err, ServdError::Serialization(_)));
    }
}
