//! OpenWeatherMap vendor adapter
//!
//! Keyed vendor using the One Call endpoint. OpenWeatherMap meters calls
//! on its side regardless of the HTTP outcome, so the quota ledger
//! records every attempt. Native weather alerts back `hazard_events`.
//!
//! Vendor condition ids are normalized to the WMO code table before
//! classification so the risk classifier sees one vocabulary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::OpenWeatherConfig;
use crate::error::RoadcastError;
use crate::models::{AlertSeverity, HazardAlert};
use crate::provider::{
    HourlySample, ProviderForecast, ProviderProfile, WeatherProvider, build_transport,
};
use crate::quota::QuotaLedger;
use crate::risk::{RawReading, build_sample};

pub const PROVIDER_ID: &str = "openweathermap";

pub struct OpenWeatherProvider {
    client: ClientWithMiddleware,
    ledger: Arc<QuotaLedger>,
    base_url: String,
    api_key: String,
    daily_limit: u32,
}

impl OpenWeatherProvider {
    pub fn new(
        config: &OpenWeatherConfig,
        timeout: Duration,
        ledger: Arc<QuotaLedger>,
    ) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RoadcastError::config("OpenWeatherMap requires an API key"))?;

        Ok(Self {
            client: build_transport(timeout)?,
            ledger,
            base_url: config.base_url.clone(),
            api_key,
            daily_limit: config.daily_limit,
        })
    }

    async fn fetch_onecall(&self, lat: f64, lng: f64, exclude: &str) -> Result<OneCallResponse> {
        let url = format!(
            "{}/onecall?lat={}&lon={}&units=metric&exclude={}&appid={}",
            self.base_url, lat, lng, exclude, self.api_key
        );
        debug!(lat, lng, exclude, "OpenWeatherMap onecall request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RoadcastError::provider_unavailable(PROVIDER_ID, e.to_string()))?;

        if !response.status().is_success() {
            return Err(RoadcastError::provider_unavailable(
                PROVIDER_ID,
                format!("HTTP {}", response.status()),
            ));
        }

        response.json::<OneCallResponse>().await.map_err(|e| {
            RoadcastError::api(format!("failed to parse OpenWeatherMap response: {e}"))
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    fn profile(&self) -> ProviderProfile {
        // Paid tier: fastest and most reliable, but not free
        ProviderProfile {
            cost_rank: 1,
            latency_rank: 0,
            reliability_rank: 0,
        }
    }

    #[instrument(skip(self), fields(provider = PROVIDER_ID))]
    async fn current_and_forecast(
        &self,
        lat: f64,
        lng: f64,
        horizon_hours: u32,
    ) -> Result<ProviderForecast> {
        let outcome = self.fetch_onecall(lat, lng, "minutely,daily,alerts").await;
        // Vendor charges the attempt, not the outcome; billing is
        // best-effort and never masks the vendor result
        if let Err(e) = self.ledger.record_call(PROVIDER_ID, "onecall").await {
            warn!("failed to record quota usage for {PROVIDER_ID}: {e}");
        }
        let response = outcome?;

        let current = response
            .current
            .as_ref()
            .ok_or_else(|| RoadcastError::api("OpenWeatherMap response missing current block"))?;

        let now = Utc::now();
        let cutoff = now + ChronoDuration::hours(i64::from(horizon_hours));
        let hourly = response
            .hourly
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                let timestamp = DateTime::from_timestamp(entry.dt, 0)?;
                if timestamp < now || timestamp > cutoff {
                    return None;
                }
                Some(HourlySample {
                    timestamp,
                    sample: build_sample(entry.to_reading()),
                })
            })
            .collect();

        Ok(ProviderForecast {
            current: build_sample(current.to_reading()),
            hourly,
        })
    }

    /// One Call alerts are point-scoped by the vendor; `radius_km` is
    /// accepted for contract parity.
    #[instrument(skip(self), fields(provider = PROVIDER_ID))]
    async fn hazard_events(
        &self,
        lat: f64,
        lng: f64,
        _radius_km: f64,
    ) -> Result<Vec<HazardAlert>> {
        let outcome = self
            .fetch_onecall(lat, lng, "minutely,hourly,daily,current")
            .await;
        if let Err(e) = self.ledger.record_call(PROVIDER_ID, "alerts").await {
            warn!("failed to record quota usage for {PROVIDER_ID}: {e}");
        }
        let response = outcome?;

        Ok(response
            .alerts
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, alert)| {
                let severity = alert_severity(&alert.event, &alert.tags);
                HazardAlert {
                    id: format!("{PROVIDER_ID}:{}:{}", alert.start.unwrap_or(i as i64), i),
                    severity,
                    headline: alert.description.unwrap_or_else(|| alert.event.clone()),
                    event: alert.event,
                    starts_at: alert.start.and_then(|s| DateTime::from_timestamp(s, 0)),
                    ends_at: alert.end.and_then(|e| DateTime::from_timestamp(e, 0)),
                }
            })
            .collect())
    }

    async fn remaining_quota(&self) -> u32 {
        match self.ledger.check(PROVIDER_ID, self.daily_limit).await {
            Ok(status) => status.remaining,
            Err(e) => {
                warn!("quota check failed for {PROVIDER_ID}: {e}");
                0
            }
        }
    }
}

/// OpenWeatherMap carries no severity field on alerts; classify from the
/// event name and tags. Unknown phrasing degrades to minor, never fails.
fn alert_severity(event: &str, tags: &[String]) -> AlertSeverity {
    let haystack = format!("{} {}", event.to_lowercase(), tags.join(" ").to_lowercase());

    if ["extreme", "tornado", "hurricane"]
        .iter()
        .any(|term| haystack.contains(term))
    {
        AlertSeverity::Extreme
    } else if ["severe", "warning"].iter().any(|term| haystack.contains(term)) {
        AlertSeverity::Severe
    } else if ["watch", "advisory"].iter().any(|term| haystack.contains(term)) {
        AlertSeverity::Moderate
    } else {
        AlertSeverity::Minor
    }
}

/// Map OpenWeatherMap condition ids onto the WMO code table
fn wmo_code(condition_id: u32) -> u16 {
    match condition_id {
        // Thunderstorms
        200..=209 | 221 | 230..=232 => 95,
        210..=219 => 95,
        // Drizzle
        300..=302 => 53,
        310..=321 => 55,
        // Rain
        500 => 61,
        501 => 63,
        502..=504 => 65,
        511 => 66,
        520 => 80,
        521 => 81,
        522 | 531 => 82,
        // Snow
        600 => 71,
        601 => 73,
        602 => 75,
        611..=616 => 66,
        620..=622 => 85,
        // Atmosphere
        701 | 711 | 721 | 731 | 741 | 751 | 761 | 762 => 45,
        // Clear and clouds
        800 => 0,
        801 => 1,
        802 => 2,
        803 | 804 => 3,
        _ => 0,
    }
}

/// One Call response from OpenWeatherMap
#[derive(Debug, Deserialize)]
struct OneCallResponse {
    current: Option<ObservationData>,
    hourly: Option<Vec<ObservationData>>,
    alerts: Option<Vec<AlertData>>,
}

/// Shared shape of current and hourly observations
#[derive(Debug, Deserialize)]
struct ObservationData {
    dt: i64,
    temp: f32,
    humidity: Option<f32>,
    /// m/s with metric units; converted to km/h internally
    wind_speed: Option<f32>,
    wind_gust: Option<f32>,
    /// Meters; converted to km internally
    visibility: Option<f32>,
    uvi: Option<f32>,
    clouds: Option<u8>,
    weather: Option<Vec<ConditionData>>,
    rain: Option<PrecipVolume>,
    snow: Option<PrecipVolume>,
}

impl ObservationData {
    fn to_reading(&self) -> RawReading {
        let condition_id = self
            .weather
            .as_ref()
            .and_then(|w| w.first())
            .map_or(800, |w| w.id);

        let precipitation = self.rain.as_ref().and_then(|r| r.one_hour).unwrap_or(0.0)
            + self.snow.as_ref().and_then(|s| s.one_hour).unwrap_or(0.0);

        let wind_speed = self.wind_speed.unwrap_or(0.0) * 3.6;
        RawReading {
            temperature: self.temp,
            humidity: self.humidity.unwrap_or(0.0),
            wind_speed,
            wind_gust: self.wind_gust.map_or(wind_speed, |g| g * 3.6),
            visibility_km: self.visibility.map_or(10.0, |m| m / 1000.0),
            precipitation_intensity: precipitation,
            weather_code: wmo_code(condition_id),
            uv_index: self.uvi.unwrap_or(0.0),
            cloud_cover: self.clouds.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConditionData {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct PrecipVolume {
    #[serde(rename = "1h")]
    one_hour: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AlertData {
    event: String,
    description: Option<String>,
    start: Option<i64>,
    end: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrecipitationType, RoadRisk};

    #[test]
    fn test_wmo_mapping() {
        assert_eq!(wmo_code(212), 95); // heavy thunderstorm
        assert_eq!(wmo_code(502), 65); // heavy rain
        assert_eq!(wmo_code(602), 75); // heavy snow
        assert_eq!(wmo_code(800), 0); // clear
        assert_eq!(wmo_code(9999), 0); // unknown degrades to clear
    }

    #[test]
    fn test_alert_severity_keywords() {
        assert_eq!(
            alert_severity("Tornado Warning", &[]),
            AlertSeverity::Extreme
        );
        assert_eq!(
            alert_severity("Severe Thunderstorm Warning", &[]),
            AlertSeverity::Severe
        );
        assert_eq!(
            alert_severity("Wind Advisory", &[]),
            AlertSeverity::Moderate
        );
        assert_eq!(alert_severity("Dense Fog", &[]), AlertSeverity::Minor);
        assert_eq!(
            alert_severity("Fog", &["Extreme temperature value".to_string()]),
            AlertSeverity::Extreme
        );
    }

    struct FailingStore;

    #[async_trait]
    impl crate::quota::QuotaStore for FailingStore {
        async fn increment(&self, _key: &crate::quota::QuotaKey) -> crate::Result<u32> {
            Err(RoadcastError::store("counter store offline"))
        }

        async fn used(&self, _provider: &str, _day: chrono::NaiveDate) -> crate::Result<u32> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_broken_ledger_does_not_mask_vendor_error() {
        let config = OpenWeatherConfig {
            api_key: Some("test-key".to_string()),
            base_url: "http://127.0.0.1:1/data/3.0".to_string(),
            daily_limit: 100,
        };
        let ledger = Arc::new(QuotaLedger::new(Arc::new(FailingStore)));
        let provider =
            OpenWeatherProvider::new(&config, Duration::from_secs(1), ledger).unwrap();

        let err = provider
            .current_and_forecast(48.1, 11.5, 6)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RoadcastError::ProviderUnavailable { .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_observation_conversion() {
        let observation = ObservationData {
            dt: 1_700_000_000,
            temp: 6.5,
            humidity: Some(88.0),
            wind_speed: Some(12.0), // m/s -> 43.2 km/h
            wind_gust: Some(20.0),  // m/s -> 72 km/h
            visibility: Some(900.0),
            uvi: Some(1.0),
            clouds: Some(95),
            weather: Some(vec![ConditionData { id: 501 }]),
            rain: Some(PrecipVolume {
                one_hour: Some(4.0),
            }),
            snow: None,
        };

        let sample = build_sample(observation.to_reading());
        assert_eq!(sample.weather_code, 63);
        assert_eq!(sample.precipitation, PrecipitationType::Rain);
        assert!((sample.wind_speed - 43.2).abs() < 0.01);
        // Gust 72 km/h and visibility 0.9 km both push past the high bar
        assert_eq!(sample.road_risk, RoadRisk::High);
    }
}
