//! Weather provider adapters
//!
//! Every upstream vendor integration satisfies the [`WeatherProvider`]
//! contract: current conditions plus a short-horizon forecast, hazard
//! events, and quota-aware availability. Availability reflects the shared
//! [`QuotaLedger`](crate::quota::QuotaLedger), not just network
//! reachability — a provider with zero remaining quota reports itself
//! unavailable even when the network call would succeed.
//!
//! Retries live inside the adapter transport (`reqwest-retry`), never
//! above it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::Result;
use crate::config::EngineConfig;
use crate::error::RoadcastError;
use crate::models::{HazardAlert, WeatherSample};
use crate::quota::QuotaLedger;

pub mod open_meteo;
pub mod open_weather;
pub mod selector;

pub use selector::{ProviderSelector, SelectionStrategy};

impl std::fmt::Debug for dyn WeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherProvider")
            .field("id", &self.id())
            .finish()
    }
}

/// One hourly forecast step
#[derive(Debug, Clone)]
pub struct HourlySample {
    pub timestamp: DateTime<Utc>,
    pub sample: WeatherSample,
}

/// Current conditions plus a short-horizon hourly forecast
#[derive(Debug, Clone)]
pub struct ProviderForecast {
    pub current: WeatherSample,
    pub hourly: Vec<HourlySample>,
}

/// Static ranking of a vendor used by selection strategies.
/// Lower rank is preferred on the corresponding axis.
#[derive(Debug, Clone, Copy)]
pub struct ProviderProfile {
    pub cost_rank: u8,
    pub latency_rank: u8,
    pub reliability_rank: u8,
}

/// Contract every weather vendor integration implements.
///
/// Adapters report usage to the shared quota ledger after every call,
/// success or failure; whether a vendor charges failed attempts is a
/// per-vendor policy documented on each adapter.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Stable provider identifier used as the quota ledger key
    fn id(&self) -> &str;

    /// Vendor daily call limit enforced through the ledger
    fn daily_limit(&self) -> u32;

    /// Static cost/latency/reliability ranking for selection strategies
    fn profile(&self) -> ProviderProfile;

    /// Current conditions and an hourly forecast up to `horizon_hours`
    async fn current_and_forecast(
        &self,
        lat: f64,
        lng: f64,
        horizon_hours: u32,
    ) -> Result<ProviderForecast>;

    /// Hazard events near a point
    async fn hazard_events(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<HazardAlert>>;

    /// Calls remaining today against the vendor limit
    async fn remaining_quota(&self) -> u32;

    /// Usable right now: quota left, by the ledger's accounting
    async fn is_available(&self) -> bool {
        self.remaining_quota().await > 0
    }
}

/// Shared HTTP transport: bounded timeout plus transient-error retries
pub(crate) fn build_transport(timeout: Duration) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("roadcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RoadcastError::api(format!("failed to create HTTP client: {e}")))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Build the priority-ordered provider list from configuration
pub fn providers_from_config(
    config: &EngineConfig,
    ledger: Arc<QuotaLedger>,
) -> Result<Vec<Arc<dyn WeatherProvider>>> {
    config.validate()?;
    let timeout = Duration::from_secs(u64::from(config.providers.timeout_seconds));

    let mut providers: Vec<Arc<dyn WeatherProvider>> = Vec::new();
    for name in &config.providers.priority {
        match name.as_str() {
            open_meteo::PROVIDER_ID => {
                providers.push(Arc::new(open_meteo::OpenMeteoProvider::new(
                    &config.providers.open_meteo,
                    timeout,
                    Arc::clone(&ledger),
                )?));
            }
            open_weather::PROVIDER_ID => {
                let adapter = open_weather::OpenWeatherProvider::new(
                    &config.providers.open_weather,
                    timeout,
                    Arc::clone(&ledger),
                )?;
                providers.push(Arc::new(adapter));
            }
            other => {
                return Err(RoadcastError::config(format!(
                    "unknown weather provider '{other}'"
                )));
            }
        }
    }
    Ok(providers)
}

/// Build a ready-to-use selector from configuration
pub fn selector_from_config(
    config: &EngineConfig,
    ledger: Arc<QuotaLedger>,
) -> Result<ProviderSelector> {
    let providers = providers_from_config(config, ledger)?;
    Ok(ProviderSelector::new(providers, config.providers.strategy))
}
