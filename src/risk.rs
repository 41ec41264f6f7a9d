//! Road-risk classifier and weather-condition normalizer
//!
//! Pure functions: a raw vendor reading goes in, a fully classified
//! [`WeatherSample`] comes out. The classifier checks rules in a fixed
//! priority order because the conditions overlap; all thresholds are
//! strict comparisons, so a value sitting exactly on a threshold lands
//! on the lower severity side.

use crate::models::{PrecipitationType, RoadRisk, WeatherSample};

/// Wind gust (km/h) above which conditions are extreme
const EXTREME_GUST_KMH: f32 = 80.0;
/// Visibility (km) below which conditions are extreme
const EXTREME_VISIBILITY_KM: f32 = 0.5;
/// Precipitation intensity (mm/hr) above which conditions are high risk
const HIGH_PRECIPITATION_MM_HR: f32 = 10.0;
/// Sustained wind (km/h) above which conditions are high risk
const HIGH_WIND_KMH: f32 = 60.0;
/// Wind gust (km/h) above which conditions are high risk
const HIGH_GUST_KMH: f32 = 60.0;
/// Visibility (km) below which conditions are high risk
const HIGH_VISIBILITY_KM: f32 = 1.0;
/// Precipitation intensity (mm/hr) above which conditions are moderate risk
const MODERATE_PRECIPITATION_MM_HR: f32 = 2.0;
/// Sustained wind (km/h) above which conditions are moderate risk
const MODERATE_WIND_KMH: f32 = 40.0;
/// Visibility (km) below which conditions are moderate risk
const MODERATE_VISIBILITY_KM: f32 = 3.0;

/// WMO codes for severe thunderstorms and violent rain
const SEVERE_STORM_CODES: [u16; 4] = [82, 95, 96, 99];
/// WMO codes involving hail
const HAIL_CODES: [u16; 2] = [96, 99];
/// WMO codes involving snowfall
const SNOW_CODES: [u16; 6] = [71, 73, 75, 77, 85, 86];
/// WMO codes involving rain or drizzle (freezing rain included)
const RAIN_CODES: [u16; 13] = [51, 53, 55, 56, 57, 61, 63, 65, 66, 67, 80, 81, 82];

/// Raw vendor reading before normalization and classification.
///
/// Wind speeds in km/h, visibility in km, precipitation in mm/hr;
/// `weather_code` must already be normalized to the WMO table by the
/// provider adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawReading {
    pub temperature: f32,
    pub humidity: f32,
    pub wind_speed: f32,
    pub wind_gust: f32,
    pub visibility_km: f32,
    pub precipitation_intensity: f32,
    pub weather_code: u16,
    pub uv_index: f32,
    pub cloud_cover: u8,
}

/// Classify a reading into a road-risk level.
///
/// Rules are checked most-severe first; the first match wins.
#[must_use]
pub fn classify(
    precipitation_intensity: f32,
    wind_speed: f32,
    wind_gust: f32,
    visibility_km: f32,
    weather_code: u16,
) -> RoadRisk {
    if wind_gust > EXTREME_GUST_KMH
        || visibility_km < EXTREME_VISIBILITY_KM
        || SEVERE_STORM_CODES.contains(&weather_code)
    {
        return RoadRisk::Extreme;
    }
    if precipitation_intensity > HIGH_PRECIPITATION_MM_HR
        || wind_speed > HIGH_WIND_KMH
        || wind_gust > HIGH_GUST_KMH
        || visibility_km < HIGH_VISIBILITY_KM
        || HAIL_CODES.contains(&weather_code)
    {
        return RoadRisk::High;
    }
    if precipitation_intensity > MODERATE_PRECIPITATION_MM_HR
        || wind_speed > MODERATE_WIND_KMH
        || visibility_km < MODERATE_VISIBILITY_KM
        || SNOW_CODES.contains(&weather_code)
    {
        return RoadRisk::Moderate;
    }
    RoadRisk::Low
}

/// Normalize a WMO weather code into a canonical precipitation type.
///
/// Unknown codes degrade gracefully: nonzero precipitation defaults to
/// rain, zero precipitation to none. Never fails.
#[must_use]
pub fn precipitation_type(weather_code: u16, precipitation_intensity: f32) -> PrecipitationType {
    if HAIL_CODES.contains(&weather_code) {
        PrecipitationType::Hail
    } else if SNOW_CODES.contains(&weather_code) {
        PrecipitationType::Snow
    } else if RAIN_CODES.contains(&weather_code) || weather_code == 95 {
        PrecipitationType::Rain
    } else if precipitation_intensity > 0.0 {
        PrecipitationType::Rain
    } else {
        PrecipitationType::None
    }
}

/// Severity-qualified condition text for a WMO weather code
#[must_use]
pub fn condition_text(weather_code: u16, precipitation_intensity: f32) -> &'static str {
    match weather_code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => {
            if precipitation_intensity > 0.0 {
                "Rain"
            } else {
                "Unknown conditions"
            }
        }
    }
}

/// Build a fully classified [`WeatherSample`] from a raw vendor reading.
///
/// The only way samples are constructed: normalizer and classifier always
/// run together so `road_risk`, `precipitation`, and `condition` stay
/// consistent with the raw fields.
#[must_use]
pub fn build_sample(reading: RawReading) -> WeatherSample {
    let road_risk = classify(
        reading.precipitation_intensity,
        reading.wind_speed,
        reading.wind_gust,
        reading.visibility_km,
        reading.weather_code,
    );
    let precipitation =
        precipitation_type(reading.weather_code, reading.precipitation_intensity);
    let condition =
        condition_text(reading.weather_code, reading.precipitation_intensity).to_string();

    WeatherSample {
        temperature: reading.temperature,
        humidity: reading.humidity,
        wind_speed: reading.wind_speed,
        wind_gust: reading.wind_gust,
        visibility_km: reading.visibility_km,
        precipitation_intensity: reading.precipitation_intensity,
        precipitation,
        condition,
        weather_code: reading.weather_code,
        uv_index: reading.uv_index,
        cloud_cover: reading.cloud_cover,
        road_risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classify_reading(
        precip: f32,
        wind: f32,
        gust: f32,
        visibility: f32,
        code: u16,
    ) -> RoadRisk {
        classify(precip, wind, gust, visibility, code)
    }

    #[rstest]
    // Threshold boundaries land on the lower severity side (strict comparisons)
    #[case(0.0, 0.0, 80.0, 10.0, 0, RoadRisk::High)] // gust exactly 80 -> high, not extreme
    #[case(0.0, 0.0, 80.01, 10.0, 0, RoadRisk::Extreme)]
    #[case(0.0, 0.0, 0.0, 0.5, 0, RoadRisk::High)] // visibility exactly 0.5 -> high
    #[case(0.0, 0.0, 0.0, 0.49, 0, RoadRisk::Extreme)]
    #[case(10.0, 0.0, 0.0, 10.0, 0, RoadRisk::Moderate)] // precip exactly 10 -> moderate
    #[case(10.01, 0.0, 0.0, 10.0, 0, RoadRisk::High)]
    #[case(0.0, 60.0, 0.0, 10.0, 0, RoadRisk::Moderate)] // wind exactly 60 -> moderate
    #[case(0.0, 60.01, 0.0, 10.0, 0, RoadRisk::High)]
    #[case(0.0, 0.0, 60.0, 10.0, 0, RoadRisk::Low)] // gust exactly 60 -> low
    #[case(0.0, 0.0, 60.01, 10.0, 0, RoadRisk::High)]
    #[case(0.0, 0.0, 0.0, 1.0, 0, RoadRisk::Moderate)] // visibility exactly 1 -> moderate
    #[case(0.0, 0.0, 0.0, 0.99, 0, RoadRisk::High)]
    #[case(2.0, 0.0, 0.0, 10.0, 0, RoadRisk::Low)] // precip exactly 2 -> low
    #[case(2.01, 0.0, 0.0, 10.0, 0, RoadRisk::Moderate)]
    #[case(0.0, 40.0, 0.0, 10.0, 0, RoadRisk::Low)] // wind exactly 40 -> low
    #[case(0.0, 40.01, 0.0, 10.0, 0, RoadRisk::Moderate)]
    #[case(0.0, 0.0, 0.0, 3.0, 0, RoadRisk::Low)] // visibility exactly 3 -> low
    #[case(0.0, 0.0, 0.0, 2.99, 0, RoadRisk::Moderate)]
    fn test_threshold_boundaries(
        #[case] precip: f32,
        #[case] wind: f32,
        #[case] gust: f32,
        #[case] visibility: f32,
        #[case] code: u16,
        #[case] expected: RoadRisk,
    ) {
        assert_eq!(classify_reading(precip, wind, gust, visibility, code), expected);
    }

    #[rstest]
    #[case(95, RoadRisk::Extreme)] // thunderstorm
    #[case(99, RoadRisk::Extreme)] // thunderstorm with heavy hail
    #[case(82, RoadRisk::Extreme)] // violent rain showers
    #[case(75, RoadRisk::Moderate)] // heavy snow
    #[case(0, RoadRisk::Low)]
    fn test_code_driven_classification(#[case] code: u16, #[case] expected: RoadRisk) {
        assert_eq!(classify_reading(0.0, 0.0, 0.0, 10.0, code), expected);
    }

    #[test]
    fn test_risk_monotonicity_in_gust() {
        let mut previous = RoadRisk::Low;
        for gust in [0.0f32, 30.0, 55.0, 61.0, 79.0, 81.0, 120.0] {
            let risk = classify_reading(0.0, 0.0, gust, 10.0, 0);
            assert!(risk >= previous, "risk decreased at gust {gust}");
            previous = risk;
        }
    }

    #[test]
    fn test_risk_monotonicity_in_visibility() {
        let mut previous = RoadRisk::Low;
        for visibility in [10.0f32, 2.9, 0.9, 0.4] {
            let risk = classify_reading(0.0, 0.0, 0.0, visibility, 0);
            assert!(risk >= previous, "risk decreased at visibility {visibility}");
            previous = risk;
        }
    }

    #[test]
    fn test_unknown_code_fallback() {
        // Unknown code with precipitation degrades to rain
        assert_eq!(precipitation_type(240, 1.5), PrecipitationType::Rain);
        // Unknown code without precipitation degrades to none
        assert_eq!(precipitation_type(240, 0.0), PrecipitationType::None);
        assert_eq!(condition_text(240, 1.5), "Rain");
        assert_eq!(condition_text(240, 0.0), "Unknown conditions");
    }

    #[test]
    fn test_known_code_normalization() {
        assert_eq!(precipitation_type(75, 3.0), PrecipitationType::Snow);
        assert_eq!(precipitation_type(99, 8.0), PrecipitationType::Hail);
        assert_eq!(precipitation_type(63, 4.0), PrecipitationType::Rain);
        assert_eq!(precipitation_type(0, 0.0), PrecipitationType::None);
    }

    #[test]
    fn test_build_sample_is_consistent() {
        let sample = build_sample(RawReading {
            temperature: 4.0,
            humidity: 90.0,
            wind_speed: 30.0,
            wind_gust: 45.0,
            visibility_km: 2.0,
            precipitation_intensity: 5.0,
            weather_code: 73,
            uv_index: 0.5,
            cloud_cover: 100,
        });

        assert_eq!(sample.road_risk, RoadRisk::Moderate);
        assert_eq!(sample.precipitation, PrecipitationType::Snow);
        assert_eq!(sample.condition, "Moderate snow fall");
    }
}
