//! Open-Meteo vendor adapter
//!
//! Keyless vendor; requests are metered per attempt on the vendor side,
//! so the quota ledger records every call whether or not it succeeds.
//! Open-Meteo has no alert endpoint: hazard events are synthesized from
//! severe weather codes in the short-horizon forecast, so this adapter
//! still satisfies the full provider contract.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::OpenMeteoConfig;
use crate::error::RoadcastError;
use crate::models::{AlertSeverity, HazardAlert};
use crate::provider::{
    HourlySample, ProviderForecast, ProviderProfile, WeatherProvider, build_transport,
};
use crate::quota::QuotaLedger;
use crate::risk::{RawReading, build_sample, condition_text};

pub const PROVIDER_ID: &str = "open-meteo";

/// Forecast horizon used when deriving hazard events
const HAZARD_HORIZON_HOURS: u32 = 12;

pub struct OpenMeteoProvider {
    client: ClientWithMiddleware,
    ledger: Arc<QuotaLedger>,
    base_url: String,
    daily_limit: u32,
}

impl OpenMeteoProvider {
    pub fn new(
        config: &OpenMeteoConfig,
        timeout: Duration,
        ledger: Arc<QuotaLedger>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_transport(timeout)?,
            ledger,
            base_url: config.base_url.clone(),
            daily_limit: config.daily_limit,
        })
    }

    async fn fetch_forecast(&self, lat: f64, lng: f64) -> Result<ForecastResponse> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}\
             &current=temperature_2m,relative_humidity_2m,windspeed_10m,windgusts_10m,precipitation,cloudcover,visibility,weathercode,uv_index\
             &hourly=temperature_2m,relative_humidity_2m,windspeed_10m,windgusts_10m,precipitation,cloudcover,visibility,weathercode,uv_index\
             &forecast_days=2&wind_speed_unit=kmh&timezone=UTC",
            self.base_url, lat, lng
        );
        debug!(%url, "Open-Meteo forecast request");

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

        response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| RoadcastError::api(format!("failed to parse Open-Meteo response: {e}")))
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    fn profile(&self) -> ProviderProfile {
        // Free tier: cheapest vendor, middling latency and track record
        ProviderProfile {
            cost_rank: 0,
            latency_rank: 1,
            reliability_rank: 1,
        }
    }

    #[instrument(skip(self), fields(provider = PROVIDER_ID))]
    async fn current_and_forecast(
        &self,
        lat: f64,
        lng: f64,
        horizon_hours: u32,
    ) -> Result<ProviderForecast> {
        let outcome = self.fetch_forecast(lat, lng).await;
        // Metered per request, not per successful response. Billing is
        // best-effort: a broken ledger store must not mask the vendor
        // outcome.
        if let Err(e) = self.ledger.record_call(PROVIDER_ID, "forecast").await {
            warn!("failed to record quota usage for {PROVIDER_ID}: {e}");
        }
        let response = outcome?;

        let current_reading = response
            .current
            .as_ref()
            .map(CurrentData::to_reading)
            .ok_or_else(|| RoadcastError::api("Open-Meteo response missing current block"))?;

        let now = Utc::now();
        let cutoff = now + ChronoDuration::hours(i64::from(horizon_hours));
        let hourly = response
            .hourly
            .as_ref()
            .map(|hourly| hourly.to_samples(now, cutoff))
            .unwrap_or_default();

        Ok(ProviderForecast {
            current: build_sample(current_reading),
            hourly,
        })
    }

    /// `radius_km` is accepted for contract parity; Open-Meteo forecasts
    /// are point-sampled, so events are derived at the given point.
    #[instrument(skip(self), fields(provider = PROVIDER_ID))]
    async fn hazard_events(
        &self,
        lat: f64,
        lng: f64,
        _radius_km: f64,
    ) -> Result<Vec<HazardAlert>> {
        let outcome = self.fetch_forecast(lat, lng).await;
        if let Err(e) = self.ledger.record_call(PROVIDER_ID, "hazards").await {
            warn!("failed to record quota usage for {PROVIDER_ID}: {e}");
        }
        let response = outcome?;

        let now = Utc::now();
        let cutoff = now + ChronoDuration::hours(i64::from(HAZARD_HORIZON_HOURS));
        let hourly = response
            .hourly
            .as_ref()
            .map(|hourly| hourly.to_samples(now, cutoff))
            .unwrap_or_default();

        Ok(derive_hazard_events(&hourly))
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

/// Severe forecast codes become synthetic hazard events, one per code,
/// spanning the first to last forecast hour the code appears in.
fn derive_hazard_events(hourly: &[HourlySample]) -> Vec<HazardAlert> {
    let mut spans: BTreeMap<u16, (DateTime<Utc>, DateTime<Utc>)> = BTreeMap::new();
    for hour in hourly {
        let code = hour.sample.weather_code;
        if hazard_severity(code).is_none() {
            continue;
        }
        spans
            .entry(code)
            .and_modify(|(_, end)| *end = hour.timestamp)
            .or_insert((hour.timestamp, hour.timestamp));
    }

    spans
        .into_iter()
        .filter_map(|(code, (start, end))| {
            let severity = hazard_severity(code)?;
            let event = condition_text(code, 1.0).to_string();
            Some(HazardAlert {
                id: format!("{PROVIDER_ID}:{code}:{}", start.timestamp()),
                severity,
                headline: format!("{event} expected"),
                event,
                starts_at: Some(start),
                ends_at: Some(end),
            })
        })
        .collect()
}

fn hazard_severity(code: u16) -> Option<AlertSeverity> {
    match code {
        96 | 99 => Some(AlertSeverity::Extreme),
        82 | 95 => Some(AlertSeverity::Severe),
        65 | 67 | 75 | 86 => Some(AlertSeverity::Moderate),
        _ => None,
    }
}

/// Forecast response from Open-Meteo
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentData>,
    hourly: Option<HourlyData>,
}

/// Current weather block from Open-Meteo
#[derive(Debug, Deserialize)]
struct CurrentData {
    #[serde(rename = "temperature_2m")]
    temperature: f32,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Option<f32>,
    #[serde(rename = "windspeed_10m")]
    wind_speed: f32,
    #[serde(rename = "windgusts_10m")]
    wind_gusts: Option<f32>,
    precipitation: f32,
    #[serde(rename = "cloudcover")]
    cloud_cover: u8,
    /// Meters; converted to km internally
    visibility: Option<f32>,
    #[serde(rename = "weathercode")]
    weather_code: u16,
    uv_index: Option<f32>,
}

impl CurrentData {
    fn to_reading(&self) -> RawReading {
        RawReading {
            temperature: self.temperature,
            humidity: self.humidity.unwrap_or(0.0),
            wind_speed: self.wind_speed,
            wind_gust: self.wind_gusts.unwrap_or(self.wind_speed),
            visibility_km: self.visibility.map_or(10.0, |m| m / 1000.0),
            precipitation_intensity: self.precipitation,
            weather_code: self.weather_code,
            uv_index: self.uv_index.unwrap_or(0.0),
            cloud_cover: self.cloud_cover,
        }
    }
}

/// Hourly weather block from Open-Meteo
#[derive(Debug, Deserialize)]
struct HourlyData {
    time: Vec<String>,
    #[serde(rename = "temperature_2m")]
    temperature: Option<Vec<Option<f32>>>,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Option<Vec<Option<f32>>>,
    #[serde(rename = "windspeed_10m")]
    wind_speed: Option<Vec<Option<f32>>>,
    #[serde(rename = "windgusts_10m")]
    wind_gusts: Option<Vec<Option<f32>>>,
    precipitation: Option<Vec<Option<f32>>>,
    #[serde(rename = "cloudcover")]
    cloud_cover: Option<Vec<Option<u8>>>,
    visibility: Option<Vec<Option<f32>>>,
    #[serde(rename = "weathercode")]
    weather_code: Option<Vec<Option<u16>>>,
    uv_index: Option<Vec<Option<f32>>>,
}

impl HourlyData {
    /// Classified samples between `from` and `to`, with safe indexing and
    /// defaults for holes in the vendor arrays
    fn to_samples(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<HourlySample> {
        let mut samples = Vec::new();

        for (i, time) in self.time.iter().enumerate() {
            let Ok(naive) = chrono::NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M") else {
                continue;
            };
            let timestamp = naive.and_utc();
            if timestamp < from || timestamp > to {
                continue;
            }

            let reading = RawReading {
                temperature: pick(&self.temperature, i).unwrap_or(0.0),
                humidity: pick(&self.humidity, i).unwrap_or(0.0),
                wind_speed: pick(&self.wind_speed, i).unwrap_or(0.0),
                wind_gust: pick(&self.wind_gusts, i).unwrap_or(0.0),
                visibility_km: pick(&self.visibility, i).map_or(10.0, |m| m / 1000.0),
                precipitation_intensity: pick(&self.precipitation, i).unwrap_or(0.0),
                weather_code: pick(&self.weather_code, i).unwrap_or(0),
                uv_index: pick(&self.uv_index, i).unwrap_or(0.0),
                cloud_cover: pick(&self.cloud_cover, i).unwrap_or(0),
            };

            samples.push(HourlySample {
                timestamp,
                sample: build_sample(reading),
            });
        }

        samples
    }
}

fn pick<T: Copy>(column: &Option<Vec<Option<T>>>, index: usize) -> Option<T> {
    column
        .as_ref()
        .and_then(|values| values.get(index))
        .and_then(|value| *value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoadRisk;
    use crate::risk::build_sample;

    fn hour(ts: DateTime<Utc>, code: u16) -> HourlySample {
        HourlySample {
            timestamp: ts,
            sample: build_sample(RawReading {
                weather_code: code,
                visibility_km: 10.0,
                ..RawReading::default()
            }),
        }
    }

    #[test]
    fn test_derive_hazard_events_groups_by_code() {
        let base = Utc::now();
        let hourly = vec![
            hour(base, 0),
            hour(base + ChronoDuration::hours(1), 95),
            hour(base + ChronoDuration::hours(2), 95),
            hour(base + ChronoDuration::hours(3), 99),
        ];

        let events = derive_hazard_events(&hourly);
        assert_eq!(events.len(), 2);

        let thunder = events.iter().find(|e| e.event == "Thunderstorm").unwrap();
        assert_eq!(thunder.severity, AlertSeverity::Severe);
        assert_eq!(thunder.starts_at.unwrap(), base + ChronoDuration::hours(1));
        assert_eq!(thunder.ends_at.unwrap(), base + ChronoDuration::hours(2));

        let hail = events
            .iter()
            .find(|e| e.event == "Thunderstorm with heavy hail")
            .unwrap();
        assert_eq!(hail.severity, AlertSeverity::Extreme);
    }

    struct FailingStore;

    #[async_trait]
    impl crate::quota::QuotaStore for FailingStore {
        async fn increment(&self, _key: &crate::quota::QuotaKey) -> Result<u32> {
            Err(RoadcastError::store("counter store offline"))
        }

        async fn used(&self, _provider: &str, _day: chrono::NaiveDate) -> Result<u32> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_broken_ledger_does_not_mask_vendor_error() {
        let config = crate::config::OpenMeteoConfig {
            base_url: "http://127.0.0.1:1/v1".to_string(),
            daily_limit: 100,
        };
        let ledger = Arc::new(QuotaLedger::new(Arc::new(FailingStore)));
        let provider = OpenMeteoProvider::new(&config, Duration::from_secs(1), ledger).unwrap();

        // The vendor is unreachable and the ledger store fails too; the
        // vendor outcome is what the caller must see
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
    fn test_calm_forecast_yields_no_events() {
        let base = Utc::now();
        let hourly = vec![hour(base, 0), hour(base + ChronoDuration::hours(1), 2)];
        assert!(derive_hazard_events(&hourly).is_empty());
    }

    #[test]
    fn test_hourly_parsing_with_holes() {
        let hourly = HourlyData {
            time: vec!["2026-08-29T10:00".to_string(), "bogus".to_string()],
            temperature: Some(vec![Some(18.0), None]),
            humidity: None,
            wind_speed: Some(vec![Some(20.0), Some(21.0)]),
            wind_gusts: Some(vec![None, None]),
            precipitation: Some(vec![Some(0.0), Some(0.0)]),
            cloud_cover: None,
            visibility: Some(vec![Some(8000.0), None]),
            weather_code: Some(vec![Some(1), Some(1)]),
            uv_index: None,
        };

        let from = "2026-08-29T00:00:00Z".parse().unwrap();
        let to = "2026-08-30T00:00:00Z".parse().unwrap();
        let samples = hourly.to_samples(from, to);

        // The unparseable timestamp is skipped, not fatal
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sample.temperature, 18.0);
        assert_eq!(samples[0].sample.visibility_km, 8.0);
        assert_eq!(samples[0].sample.road_risk, RoadRisk::Low);
    }
}
