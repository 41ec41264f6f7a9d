//! Error types and handling for the `roadcast` engine

use thiserror::Error;

/// Main error type for the `roadcast` engine
#[derive(Error, Debug)]
pub enum RoadcastError {
    /// A single weather provider could not serve the request
    /// (quota exhausted, vendor error, or timeout)
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The selector found no provider with remaining quota
    #[error("All weather providers exhausted")]
    AllProvidersExhausted,

    /// Route analysis resolved zero of the sampled points
    #[error("No weather data available for this route")]
    NoWeatherDataAvailable,

    /// AI text enhancement failed; always non-fatal for delivery
    #[error("Message enhancement failed: {message}")]
    EnhancementFailed { message: String },

    /// Response cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Quota ledger / counter store errors
    #[error("Quota store error: {message}")]
    Store { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Vendor API communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RoadcastError {
    /// Create a new provider-unavailable error
    pub fn provider_unavailable<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a new enhancement error
    pub fn enhancement<S: Into<String>>(message: S) -> Self {
        Self::EnhancementFailed {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new quota store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True when the error means "no provider is usable right now"
    #[must_use]
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, RoadcastError::AllProvidersExhausted)
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RoadcastError::ProviderUnavailable { .. } | RoadcastError::Api { .. } => {
                "Unable to reach the weather service. Please check your internet connection."
                    .to_string()
            }
            RoadcastError::AllProvidersExhausted => {
                "Weather data is temporarily unavailable (daily limits reached).".to_string()
            }
            RoadcastError::NoWeatherDataAvailable => {
                "No weather data could be retrieved for this route.".to_string()
            }
            RoadcastError::EnhancementFailed { .. } => {
                "Advisory wording could not be enhanced.".to_string()
            }
            RoadcastError::Cache { .. } | RoadcastError::Store { .. } => {
                "Local storage operation failed. You may need to clear the app cache.".to_string()
            }
            RoadcastError::Config { .. } => {
                "Configuration error. Please check the engine configuration.".to_string()
            }
            RoadcastError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            RoadcastError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<anyhow::Error> for RoadcastError {
    fn from(err: anyhow::Error) -> Self {
        RoadcastError::api(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let provider_err = RoadcastError::provider_unavailable("open-meteo", "quota exhausted");
        assert!(matches!(
            provider_err,
            RoadcastError::ProviderUnavailable { .. }
        ));

        let cache_err = RoadcastError::cache("corrupt entry");
        assert!(matches!(cache_err, RoadcastError::Cache { .. }));

        let validation_err = RoadcastError::validation("invalid coordinates");
        assert!(matches!(validation_err, RoadcastError::Validation { .. }));
    }

    #[test]
    fn test_user_messages() {
        let exhausted = RoadcastError::AllProvidersExhausted;
        assert!(exhausted.user_message().contains("daily limits"));

        let api_err = RoadcastError::api("connection failed");
        assert!(api_err.user_message().contains("Unable to reach"));

        let validation_err = RoadcastError::validation("test input");
        assert!(validation_err.user_message().contains("test input"));
    }

    #[test]
    fn test_exhaustion_predicate() {
        assert!(RoadcastError::AllProvidersExhausted.is_exhaustion());
        assert!(!RoadcastError::NoWeatherDataAvailable.is_exhaustion());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RoadcastError = io_err.into();
        assert!(matches!(err, RoadcastError::Io { .. }));
    }
}
