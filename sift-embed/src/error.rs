//! Error types for the embedding and completion providers

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Failure talking to a remote model provider.
///
/// Both [`EmbedError`] and [`CompletionError`] wrap this type, so the HTTP
/// adapters share one transport and one retry classification.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    /// The request could not be sent or the response body could not be read
    #[error("request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success HTTP status
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered, but not in the shape the adapter understands
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl ProviderFailure {
    /// Create an invalid-response failure with a custom message.
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Rate limiting, server errors, timeouts and connection failures are
    /// transient. Client errors and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { source } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::InvalidResponse { .. } => false,
        }
    }
}

/// Error type for embedding operations.
///
/// # Error Categories
///
/// - **Configuration Errors**: Invalid provider settings or a missing API key
/// - **Provider Errors**: Network, HTTP status or response-shape failures
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when provider configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The environment variable holding the API key is not set
    #[error("Missing API key: environment variable {var} is not set")]
    MissingApiKey { var: String },

    /// Error from the remote embedding provider
    #[error("Embedding generation failed: {source}")]
    Provider {
        #[from]
        source: ProviderFailure,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    ///
    /// # Arguments
    /// * `message` - A descriptive error message explaining what's wrong with the configuration
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid-response error, for adapters that received output they
    /// cannot map onto an embedding vector.
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            source: ProviderFailure::invalid_response(message),
        }
    }
}

/// Error type for completion operations.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Error when provider configuration is invalid
    #[error("Invalid completion configuration: {message}")]
    InvalidConfig { message: String },

    /// The environment variable holding the API key is not set
    #[error("Missing API key: environment variable {var} is not set")]
    MissingApiKey { var: String },

    /// Error from the remote completion provider
    #[error("Completion failed: {source}")]
    Provider {
        #[from]
        source: ProviderFailure,
    },
}

impl CompletionError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid-response error.
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            source: ProviderFailure::invalid_response(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retry_classification() {
        let throttled = ProviderFailure::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        let unavailable = ProviderFailure::Status {
            status: 503,
            body: String::new(),
        };
        let unauthorized = ProviderFailure::Status {
            status: 401,
            body: "bad key".to_string(),
        };

        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!unauthorized.is_retryable());
        assert!(!ProviderFailure::invalid_response("no data").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = EmbedError::MissingApiKey {
            var: "OPENAI_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing API key: environment variable OPENAI_API_KEY is not set"
        );

        let err = CompletionError::invalid_response("empty choices");
        assert_eq!(
            err.to_string(),
            "Completion failed: invalid response: empty choices"
        );
    }
}
