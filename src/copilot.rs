//! Navigation copilot: advisory decision engine
//!
//! Evaluated on a fixed external cadence while a navigation session is
//! active. Each tick is a pure function of the session state, live
//! telemetry, route progress, the weather-segment timeline, and nearby
//! safe places; it returns at most one advisory and updates the
//! per-timer cooldown ledger. Rule order is the tie-break when several
//! rules match on the same tick.
//!
//! Session state lives on the session object and is reset on start;
//! nothing here survives a restart, intentionally.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::Result;
use crate::models::{
    AdvisoryCategory, AdvisoryMessage, AdvisoryPriority, Coordinate, RoadRisk, RouteProgress,
    RouteSegment, SafePlace, VehicleTelemetry,
};

/// Hazard lookahead window along the route, in km
const HAZARD_LOOKAHEAD_KM: f64 = 10.0;
/// A safe place counts as "nearby" for shelter suggestions within this range
const SHELTER_RANGE_KM: f64 = 5.0;
/// Tolerated excess over the recommended speed before advising, in km/h
const SPEED_TOLERANCE_KMH: f32 = 20.0;
/// Remaining distance that counts as "near arrival", in km
const NEAR_ARRIVAL_KM: f64 = 1.0;

/// The five independent cooldown timers. Two of them feed the same
/// advisory category (weather warnings), which is why the ledger is not
/// keyed by [`AdvisoryCategory`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownTimer {
    WeatherAhead,
    WeatherChange,
    SpeedAdvisory,
    ShelterSuggestion,
    NearArrival,
}

impl CooldownTimer {
    fn window(self) -> ChronoDuration {
        match self {
            CooldownTimer::WeatherAhead => ChronoDuration::seconds(60),
            CooldownTimer::WeatherChange => ChronoDuration::seconds(120),
            CooldownTimer::SpeedAdvisory => ChronoDuration::seconds(120),
            CooldownTimer::ShelterSuggestion => ChronoDuration::seconds(300),
            CooldownTimer::NearArrival => ChronoDuration::seconds(600),
        }
    }
}

/// Recommended maximum speed for a risk band, in km/h
#[must_use]
pub fn recommended_speed_kmh(risk: RoadRisk) -> f32 {
    match risk {
        RoadRisk::Low => 120.0,
        RoadRisk::Moderate => 90.0,
        RoadRisk::High => 60.0,
        RoadRisk::Extreme => 40.0,
    }
}

/// Per-session copilot state: cooldown ledger plus change-detection
/// markers. Reset at session start, never persisted.
#[derive(Debug, Default, Clone)]
pub struct CopilotState {
    cooldowns: HashMap<CooldownTimer, DateTime<Utc>>,
    last_announced_risk: Option<RoadRisk>,
    /// Rounded `distance_km` of the hazard announced in the current
    /// cooldown window; cleared once the window elapses
    last_warned_km: Option<i64>,
}

impl CopilotState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn elapsed(&self, timer: CooldownTimer, now: DateTime<Utc>) -> bool {
        self.cooldowns
            .get(&timer)
            .is_none_or(|last| now - *last >= timer.window())
    }

    fn mark(&mut self, timer: CooldownTimer, now: DateTime<Utc>) {
        self.cooldowns.insert(timer, now);
    }
}

/// Inputs read once per evaluation tick
#[derive(Debug, Clone, Copy)]
pub struct CopilotInput<'a> {
    pub telemetry: &'a VehicleTelemetry,
    pub progress: &'a RouteProgress,
    /// Weather-segment timeline ordered by `distance_km`
    pub segments: &'a [RouteSegment],
    /// Safe-stop candidates, freshness managed by the caller
    pub safe_places: &'a [SafePlace],
}

/// One evaluation tick. Decision order, first applicable rule wins:
/// upcoming severe weather, risk-band change, speed advisory, shelter
/// suggestion, near arrival. Emits at most one message and never fails;
/// "nothing to say" is a normal `None`.
pub fn evaluate(
    state: &mut CopilotState,
    input: &CopilotInput<'_>,
    now: DateTime<Utc>,
) -> Option<AdvisoryMessage> {
    let current_km = input.progress.current_km;
    let current_segment = segment_at(input.segments, current_km);

    // Rule 1: severe weather ahead within the lookahead window. The
    // identity marker spans a single cooldown window; once the timer has
    // elapsed, a hazard that is still ahead is announced again.
    if state.elapsed(CooldownTimer::WeatherAhead, now) {
        state.last_warned_km = None;
    }
    if let Some(hazard) = upcoming_hazard(input.segments, current_km) {
        let hazard_key = hazard.distance_km.round() as i64;
        if state.last_warned_km != Some(hazard_key)
            && state.elapsed(CooldownTimer::WeatherAhead, now)
        {
            let distance = hazard.distance_km - current_km;
            let risk = hazard.weather.road_risk;
            let mut text = format!(
                "{} ahead in {:.0} km: {} conditions.",
                hazard.weather.condition,
                distance,
                risk.label()
            );

            let priority = if risk == RoadRisk::Extreme {
                // A reachable safe place before the hazard rides along in
                // the same message, never as a second one
                if let Some(place) = nearest_safe_place(input.safe_places) {
                    if place.distance_km < distance {
                        text.push_str(&format!(
                            " Consider stopping at {} ({:.1} km ahead).",
                            place.name, place.distance_km
                        ));
                    }
                }
                AdvisoryPriority::Critical
            } else {
                AdvisoryPriority::High
            };

            state.mark(CooldownTimer::WeatherAhead, now);
            state.last_warned_km = Some(hazard_key);
            return Some(message(AdvisoryCategory::WeatherWarning, priority, text, now));
        }
    }

    // Rule 2: entering a new high/extreme risk band
    if let Some(segment) = current_segment {
        let risk = segment.weather.road_risk;
        if risk >= RoadRisk::High
            && state.last_announced_risk != Some(risk)
            && state.elapsed(CooldownTimer::WeatherChange, now)
        {
            let text = format!(
                "Conditions have changed: {} — {} risk. Drive carefully.",
                segment.weather.condition,
                risk.label()
            );
            state.mark(CooldownTimer::WeatherChange, now);
            state.last_announced_risk = Some(risk);
            return Some(message(
                AdvisoryCategory::WeatherWarning,
                AdvisoryPriority::High,
                text,
                now,
            ));
        }
    }

    // Rule 3: speeding for the conditions
    if let Some(segment) = current_segment {
        let recommended = recommended_speed_kmh(segment.weather.road_risk);
        if input.telemetry.speed_kmh() > recommended + SPEED_TOLERANCE_KMH
            && state.elapsed(CooldownTimer::SpeedAdvisory, now)
        {
            let text = format!(
                "Current conditions suggest keeping below {recommended:.0} km/h."
            );
            state.mark(CooldownTimer::SpeedAdvisory, now);
            return Some(message(
                AdvisoryCategory::SpeedAdvisory,
                AdvisoryPriority::Medium,
                text,
                now,
            ));
        }
    }

    // Rule 4: extreme conditions with shelter in range
    if let Some(segment) = current_segment {
        if segment.weather.road_risk == RoadRisk::Extreme {
            if let Some(place) = nearest_safe_place(input.safe_places) {
                if place.distance_km <= SHELTER_RANGE_KM
                    && state.elapsed(CooldownTimer::ShelterSuggestion, now)
                {
                    let text = format!(
                        "Extreme conditions. {} is {:.1} km away — consider waiting it out.",
                        place.name, place.distance_km
                    );
                    state.mark(CooldownTimer::ShelterSuggestion, now);
                    return Some(message(
                        AdvisoryCategory::ShelterSuggestion,
                        AdvisoryPriority::Critical,
                        text,
                        now,
                    ));
                }
            }
        }
    }

    // Rule 5: near arrival
    if input.progress.remaining_km() <= NEAR_ARRIVAL_KM
        && state.elapsed(CooldownTimer::NearArrival, now)
    {
        let text = format!(
            "Arriving in about {:.1} km.",
            input.progress.remaining_km()
        );
        state.mark(CooldownTimer::NearArrival, now);
        return Some(message(
            AdvisoryCategory::Arrival,
            AdvisoryPriority::Low,
            text,
            now,
        ));
    }

    None
}

fn message(
    category: AdvisoryCategory,
    priority: AdvisoryPriority,
    text: String,
    now: DateTime<Utc>,
) -> AdvisoryMessage {
    AdvisoryMessage {
        category,
        priority,
        text,
        created_at: now,
    }
}

/// Nearest segment strictly ahead, within the lookahead window, at high
/// or extreme risk
fn upcoming_hazard(segments: &[RouteSegment], current_km: f64) -> Option<&RouteSegment> {
    segments.iter().find(|s| {
        s.distance_km > current_km
            && s.distance_km <= current_km + HAZARD_LOOKAHEAD_KM
            && s.weather.road_risk >= RoadRisk::High
    })
}

/// Segment covering the current position: last segment at or before
/// `current_km`, falling back to the first
fn segment_at(segments: &[RouteSegment], current_km: f64) -> Option<&RouteSegment> {
    segments
        .iter()
        .rev()
        .find(|s| s.distance_km <= current_km)
        .or_else(|| segments.first())
}

fn nearest_safe_place(places: &[SafePlace]) -> Option<&SafePlace> {
    places
        .iter()
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
}

/// Structured context handed to the AI enhancement collaborator
#[derive(Debug, Clone, Copy)]
pub struct EnhancementContext {
    pub coordinate: Coordinate,
    pub speed_kmh: f32,
    pub remaining_km: f64,
}

/// Speech/audio sink collaborator. `preempt` asks the sink to cancel
/// in-flight lower-priority speech; enforcement is the sink's job.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, message: &AdvisoryMessage, preempt: bool) -> Result<()>;
}

/// AI text-enhancement collaborator: best-effort rephrasing of an
/// already-decided message. Fallible by design.
#[async_trait]
pub trait MessageEnhancer: Send + Sync {
    async fn enhance(&self, base: &AdvisoryMessage, context: &EnhancementContext)
        -> Result<String>;
}

struct SessionInner {
    state: CopilotState,
    pending_enhancement: Option<JoinHandle<()>>,
    stopped: bool,
}

/// One active navigation session.
///
/// The whole evaluate-and-mutate step runs under a single mutex so every
/// tick sees a consistent state snapshot; there is no finer-grained
/// locking of individual cooldown entries.
pub struct CopilotSession {
    inner: Mutex<SessionInner>,
    speech: Arc<dyn SpeechSink>,
    enhancer: Option<Arc<dyn MessageEnhancer>>,
    enhancement_timeout: Duration,
}

impl CopilotSession {
    pub fn new(
        speech: Arc<dyn SpeechSink>,
        enhancer: Option<Arc<dyn MessageEnhancer>>,
        enhancement_timeout: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                state: CopilotState::new(),
                pending_enhancement: None,
                stopped: false,
            }),
            speech,
            enhancer,
            enhancement_timeout,
        }
    }

    /// One evaluation tick. Returns the advisory decided this tick, if
    /// any; delivery to the speech sink happens internally. Bookkeeping
    /// never fails — a sink rejection is logged, not raised.
    pub async fn tick(&self, input: CopilotInput<'_>) -> Option<AdvisoryMessage> {
        let mut inner = self.inner.lock().await;
        if inner.stopped {
            return None;
        }

        let advisory = evaluate(&mut inner.state, &input, Utc::now())?;
        info!(
            category = ?advisory.category,
            priority = ?advisory.priority,
            "advisory decided"
        );

        match &self.enhancer {
            Some(enhancer) if advisory.preempts_speech() => {
                // Critical messages may be rephrased by the AI collaborator.
                // The round trip runs as a cancellable task owned by the
                // session; on any failure the base message is still delivered.
                let context = EnhancementContext {
                    coordinate: input.telemetry.coordinate,
                    speed_kmh: input.telemetry.speed_kmh(),
                    remaining_km: input.progress.remaining_km(),
                };
                if let Some(previous) = inner.pending_enhancement.take() {
                    previous.abort();
                }
                let handle = tokio::spawn(deliver_enhanced(
                    Arc::clone(enhancer),
                    Arc::clone(&self.speech),
                    advisory.clone(),
                    context,
                    self.enhancement_timeout,
                ));
                inner.pending_enhancement = Some(handle);
            }
            _ => {
                if let Err(e) = self
                    .speech
                    .speak(&advisory, advisory.preempts_speech())
                    .await
                {
                    warn!("speech sink rejected advisory: {e}");
                }
            }
        }

        Some(advisory)
    }

    /// Tear down the session: cancel any pending enhancement and clear
    /// the cooldown ledger. Idempotent.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(pending) = inner.pending_enhancement.take() {
            pending.abort();
        }
        inner.state = CopilotState::new();
        if !inner.stopped {
            inner.stopped = true;
            debug!("copilot session stopped");
        }
    }
}

/// Enhancement round trip with a hard deadline; any failure falls back
/// to the engine's own base message
async fn deliver_enhanced(
    enhancer: Arc<dyn MessageEnhancer>,
    speech: Arc<dyn SpeechSink>,
    base: AdvisoryMessage,
    context: EnhancementContext,
    deadline: Duration,
) {
    let delivered = match timeout(deadline, enhancer.enhance(&base, &context)).await {
        Ok(Ok(text)) => AdvisoryMessage { text, ..base.clone() },
        Ok(Err(e)) => {
            warn!("message enhancement failed, delivering base message: {e}");
            base.clone()
        }
        Err(_) => {
            warn!("message enhancement timed out, delivering base message");
            base.clone()
        }
    };

    if let Err(e) = speech.speak(&delivered, true).await {
        warn!("speech sink rejected advisory: {e}");
    }
}
