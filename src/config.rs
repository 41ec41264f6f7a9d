//! Engine configuration
//!
//! Deserializable configuration with field-level defaults, so a host
//! application can supply a partial document (or none at all) and still
//! get a working engine. Validation happens once, up front, when the
//! provider stack is built.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::RoadcastError;
use crate::provider::selector::SelectionStrategy;

/// Root configuration for the roadcast engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Weather provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Copilot advisory configuration
    #[serde(default)]
    pub copilot: CopilotConfig,
}

/// Weather provider stack configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Priority order; earlier entries break ranking ties
    #[serde(default = "default_provider_priority")]
    pub priority: Vec<String>,
    /// Selection strategy policy knob
    #[serde(default)]
    pub strategy: SelectionStrategy,
    /// Request timeout in seconds, applied per provider call
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub open_meteo: OpenMeteoConfig,
    #[serde(default)]
    pub open_weather: OpenWeatherConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            priority: default_provider_priority(),
            strategy: SelectionStrategy::default(),
            timeout_seconds: default_timeout_seconds(),
            open_meteo: OpenMeteoConfig::default(),
            open_weather: OpenWeatherConfig::default(),
        }
    }
}

/// Open-Meteo vendor settings (no API key required)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoConfig {
    #[serde(default = "default_open_meteo_base_url")]
    pub base_url: String,
    /// Vendor-contract daily call limit
    #[serde(default = "default_open_meteo_daily_limit")]
    pub daily_limit: u32,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            base_url: default_open_meteo_base_url(),
            daily_limit: default_open_meteo_daily_limit(),
        }
    }
}

/// OpenWeatherMap vendor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    /// API key; required only when this vendor is in the priority list
    pub api_key: Option<String>,
    #[serde(default = "default_open_weather_base_url")]
    pub base_url: String,
    /// Vendor-contract daily call limit
    #[serde(default = "default_open_weather_daily_limit")]
    pub daily_limit: u32,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_open_weather_base_url(),
            daily_limit: default_open_weather_daily_limit(),
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache database directory; a leading `~/` resolves to the home
    /// directory via [`CacheConfig::resolved_location`]
    #[serde(default = "default_cache_location")]
    pub location: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
        }
    }
}

impl CacheConfig {
    /// Cache directory as a filesystem path. The storage layer does no
    /// tilde expansion, so `~/` is resolved here; without a home
    /// directory the system temp directory is used.
    #[must_use]
    pub fn resolved_location(&self) -> PathBuf {
        match self.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| std::env::temp_dir().join("roadcast")),
            None => PathBuf::from(&self.location),
        }
    }
}

/// Copilot advisory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotConfig {
    /// External evaluation cadence in seconds; the scheduler is the host's
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u32,
    /// Deadline for the optional AI message enhancement round trip
    #[serde(default = "default_enhancement_timeout_seconds")]
    pub enhancement_timeout_seconds: u32,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            enhancement_timeout_seconds: default_enhancement_timeout_seconds(),
        }
    }
}

// Default value functions

fn default_provider_priority() -> Vec<String> {
    vec!["open-meteo".to_string()]
}

fn default_timeout_seconds() -> u32 {
    10
}

fn default_open_meteo_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_open_meteo_daily_limit() -> u32 {
    10_000
}

fn default_open_weather_base_url() -> String {
    "https://api.openweathermap.org/data/3.0".to_string()
}

fn default_open_weather_daily_limit() -> u32 {
    1_000
}

fn default_cache_location() -> String {
    "~/.cache/roadcast".to_string()
}

fn default_tick_seconds() -> u32 {
    30
}

fn default_enhancement_timeout_seconds() -> u32 {
    5
}

impl EngineConfig {
    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.providers.priority.is_empty() {
            return Err(RoadcastError::config(
                "provider priority list cannot be empty",
            ));
        }
        if self.providers.timeout_seconds == 0 {
            return Err(RoadcastError::config("request timeout must be positive"));
        }
        if self.copilot.tick_seconds == 0 {
            return Err(RoadcastError::config("copilot cadence must be positive"));
        }
        if self
            .providers
            .priority
            .iter()
            .any(|p| p == "openweathermap")
            && self.providers.open_weather.api_key.is_none()
        {
            return Err(RoadcastError::config(
                "OpenWeatherMap is configured but no API key is set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.priority, vec!["open-meteo"]);
        assert_eq!(config.providers.strategy, SelectionStrategy::CostOptimized);
        assert_eq!(config.copilot.tick_seconds, 30);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "providers": { "priority": ["open-meteo", "openweathermap"],
                 "open_weather": { "api_key": "secret" } } }"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.providers.timeout_seconds, 10);
        assert_eq!(config.providers.open_weather.daily_limit, 1_000);
        assert!(config.providers.open_meteo.base_url.contains("open-meteo"));
    }

    #[test]
    fn test_openweathermap_requires_api_key() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "providers": { "priority": ["openweathermap"] } }"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, RoadcastError::Config { .. }));
    }

    #[test]
    fn test_default_cache_location_expands_tilde() {
        let config = CacheConfig::default();
        let path = config.resolved_location();
        assert!(
            !path.to_string_lossy().contains('~'),
            "unexpanded tilde in {path:?}"
        );
        assert!(path.ends_with(".cache/roadcast") || path.ends_with("roadcast"));
    }

    #[test]
    fn test_explicit_cache_location_passes_through() {
        let config = CacheConfig {
            location: "/var/cache/roadcast".to_string(),
        };
        assert_eq!(
            config.resolved_location(),
            PathBuf::from("/var/cache/roadcast")
        );
    }

    #[test]
    fn test_empty_priority_rejected() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "providers": { "priority": [] } }"#).unwrap();
        assert!(config.validate().is_err());
    }
}
