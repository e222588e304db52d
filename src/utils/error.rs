use thiserror::Error;

/// Result type alias for the security module
pub type Result<T> = std::result::Result<T, GuardError>;

/// Error types for the security module
#[derive(Error, Debug)]
pub enum GuardError {
    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system errors
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Key-value storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Token handling errors
    #[error("Token error: {message}")]
    Token { message: String },

    /// Sealing/unsealing errors for persisted secrets
    #[error("Crypto error: {message}")]
    Crypto { message: String },

    /// Invalid input errors
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String },

    /// Generic errors
    #[error("Security error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl GuardError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new token error
    pub fn token<S: Into<String>>(message: S) -> Self {
        Self::Token {
            message: message.into(),
        }
    }

    /// Create a new crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new rate limit error
    pub fn rate_limit<S: Into<String>>(message: S) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = GuardError::storage("backing store unavailable");
        assert!(err.to_string().contains("backing store unavailable"));

        let err = GuardError::token("bundle missing");
        assert!(err.to_string().starts_with("Token error"));
    }

    #[test]
    fn test_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: GuardError = parse_err.into();
        assert!(matches!(err, GuardError::Json(_)));
    }
}
