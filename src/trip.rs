//! Scheduled-trip recommendation
//!
//! Classifies a future trip against the hazard alerts active around its
//! departure area. The reduction is a pure rule cascade over severity
//! counts; fetching the alerts is the caller's (or [`recommend_at`]'s)
//! concern. Recomputation fully replaces the previous recommendation,
//! nothing is merged.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::Result;
use crate::models::{
    AlertSeverity, Coordinate, HazardAlert, TripRecommendation, TripStatus,
};
use crate::provider::ProviderSelector;

/// Fixed postponement suggestion when exactly one severe alert overlaps
/// the trip window
pub const SUGGESTED_DELAY_MINUTES: u32 = 60;

/// Reduce a set of active hazard alerts to one trip recommendation.
///
/// Rules, first match wins: no alerts is safe; any extreme alert, or two
/// or more severe-and-above, is danger (no delay helps); exactly one
/// severe alert suggests delaying departure; any moderate alert is
/// caution; minor-only is safe with a qualifier.
#[must_use]
pub fn recommend(alerts: &[HazardAlert], trip_distance_km: f64) -> TripRecommendation {
    if alerts.is_empty() {
        return TripRecommendation {
            status: TripStatus::Safe,
            message: "No weather hazards reported for this trip.".to_string(),
            details: format!("{trip_distance_km:.0} km route, no active alerts."),
            suggested_delay_minutes: None,
        };
    }

    let extreme = count_at(alerts, AlertSeverity::Extreme);
    let severe_and_up = count_at(alerts, AlertSeverity::Severe);
    let worst = worst_alert(alerts);

    if extreme > 0 || severe_and_up >= 2 {
        return TripRecommendation {
            status: TripStatus::Danger,
            message: format!("Dangerous conditions: {}.", worst.event),
            details: summarize(alerts),
            // Stacked or extreme hazards will not clear within a short
            // postponement, so none is suggested
            suggested_delay_minutes: None,
        };
    }

    if severe_and_up == 1 {
        return TripRecommendation {
            status: TripStatus::Delay,
            message: format!(
                "Consider delaying departure by {SUGGESTED_DELAY_MINUTES} minutes: {}.",
                worst.event
            ),
            details: summarize(alerts),
            suggested_delay_minutes: Some(SUGGESTED_DELAY_MINUTES),
        };
    }

    if count_at(alerts, AlertSeverity::Moderate) > 0 {
        return TripRecommendation {
            status: TripStatus::Caution,
            message: format!("Drive with caution: {}.", worst.event),
            details: summarize(alerts),
            suggested_delay_minutes: None,
        };
    }

    TripRecommendation {
        status: TripStatus::Safe,
        message: "Conditions look fine; minor advisories are active.".to_string(),
        details: summarize(alerts),
        suggested_delay_minutes: None,
    }
}

/// Fetch the active alerts around `origin` from the best available
/// provider and classify the trip
#[instrument(skip(selector))]
pub async fn recommend_at(
    selector: &Arc<ProviderSelector>,
    origin: Coordinate,
    radius_km: f64,
    trip_distance_km: f64,
) -> Result<TripRecommendation> {
    let provider = selector.select().await?;
    let alerts = provider
        .hazard_events(origin.latitude, origin.longitude, radius_km)
        .await?;

    let recommendation = recommend(&alerts, trip_distance_km);
    info!(
        provider = provider.id(),
        alerts = alerts.len(),
        status = ?recommendation.status,
        "trip recommendation computed"
    );
    Ok(recommendation)
}

fn count_at(alerts: &[HazardAlert], at_least: AlertSeverity) -> usize {
    alerts.iter().filter(|a| a.severity >= at_least).count()
}

/// Alerts are never empty when this is called
fn worst_alert(alerts: &[HazardAlert]) -> &HazardAlert {
    alerts
        .iter()
        .max_by_key(|a| a.severity)
        .unwrap_or(&alerts[0])
}

fn summarize(alerts: &[HazardAlert]) -> String {
    let mut lines: Vec<String> = alerts
        .iter()
        .map(|a| format!("{:?}: {}", a.severity, a.headline))
        .collect();
    lines.sort();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn alert(severity: AlertSeverity, event: &str) -> HazardAlert {
        HazardAlert {
            id: format!("test:{event}"),
            severity,
            event: event.to_string(),
            headline: format!("{event} in effect"),
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn test_no_alerts_is_safe() {
        let rec = recommend(&[], 120.0);
        assert_eq!(rec.status, TripStatus::Safe);
        assert!(rec.suggested_delay_minutes.is_none());
    }

    #[rstest]
    #[case::single_extreme(vec![alert(AlertSeverity::Extreme, "Tornado Warning")], TripStatus::Danger, None)]
    #[case::two_severe(
        vec![alert(AlertSeverity::Severe, "Thunderstorm"), alert(AlertSeverity::Severe, "Flood Warning")],
        TripStatus::Danger,
        None
    )]
    #[case::one_severe(vec![alert(AlertSeverity::Severe, "Thunderstorm")], TripStatus::Delay, Some(60))]
    #[case::severe_plus_minor(
        vec![alert(AlertSeverity::Severe, "Thunderstorm"), alert(AlertSeverity::Minor, "Fog")],
        TripStatus::Delay,
        Some(60)
    )]
    #[case::moderate(vec![alert(AlertSeverity::Moderate, "Wind Advisory")], TripStatus::Caution, None)]
    #[case::minor_only(vec![alert(AlertSeverity::Minor, "Fog")], TripStatus::Safe, None)]
    fn test_severity_cascade(
        #[case] alerts: Vec<HazardAlert>,
        #[case] expected: TripStatus,
        #[case] delay: Option<u32>,
    ) {
        let rec = recommend(&alerts, 80.0);
        assert_eq!(rec.status, expected);
        assert_eq!(rec.suggested_delay_minutes, delay);
    }

    #[test]
    fn test_danger_names_the_worst_alert() {
        let alerts = vec![
            alert(AlertSeverity::Minor, "Fog"),
            alert(AlertSeverity::Extreme, "Hurricane Warning"),
        ];
        let rec = recommend(&alerts, 200.0);
        assert_eq!(rec.status, TripStatus::Danger);
        assert!(rec.message.contains("Hurricane Warning"));
        assert!(rec.details.contains("Fog"));
    }
}
