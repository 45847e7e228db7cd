//! Forecast session: the state a presentation layer observes.
//!
//! Holds the selected location and the last result behind one lock. Each
//! request gets a fresh cancellation token and generation number; starting a
//! request cancels the previous one, and a completion is applied only while
//! its generation is still current. The last request to start wins.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ForecastError;
use crate::normalize::normalize;
use crate::provider::WeatherSource;
use crate::types::{DailySample, ForecastResult, HourlySample, Location};

/// How a request ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Fresh data was installed.
    Updated,
    /// The request failed; the placeholder result and a message were installed.
    Placeholder,
    /// A newer request started first; nothing was changed.
    Superseded,
}

/// Read-only copy of the session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub location: Location,
    pub hourly: Vec<HourlySample>,
    pub daily: Vec<DailySample>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub is_placeholder: bool,
}

#[derive(Debug)]
struct SessionState {
    selected_location: Location,
    last_result: Option<ForecastResult>,
    is_loading: bool,
    last_error: Option<String>,
    generation: u64,
    cancel: Option<CancellationToken>,
}

pub struct ForecastSession {
    source: Arc<dyn WeatherSource>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for ForecastSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastSession")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ForecastSession {
    pub fn new(source: Arc<dyn WeatherSource>, initial: Location) -> Self {
        Self {
            source,
            state: Mutex::new(SessionState {
                selected_location: initial,
                last_result: None,
                is_loading: false,
                last_error: None,
                generation: 0,
                cancel: None,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        let (hourly, daily, last_updated, is_placeholder) = match &state.last_result {
            Some(result) => (
                result.hourly.clone(),
                result.daily.clone(),
                Some(result.fetched_at),
                result.is_placeholder,
            ),
            None => (Vec::new(), Vec::new(), None, false),
        };

        SessionSnapshot {
            location: state.selected_location.clone(),
            hourly,
            daily,
            last_updated,
            is_loading: state.is_loading,
            error_message: state.last_error.clone(),
            is_placeholder,
        }
    }

    pub fn selected_location(&self) -> Location {
        self.state.lock().selected_location.clone()
    }

    /// Fetch and normalize the forecast for `location`, superseding any
    /// request still in flight.
    pub async fn request_forecast(&self, location: Location) -> RequestOutcome {
        self.fetch(location, false).await
    }

    /// Re-request the currently selected location.
    pub async fn refresh(&self) -> RequestOutcome {
        let location = self.selected_location();
        self.request_forecast(location).await
    }

    /// Change the selected location and request its forecast.
    pub async fn select_location(&self, location: Location) -> RequestOutcome {
        self.fetch(location, true).await
    }

    /// Resolve free text to a place and select it.
    pub async fn search_and_select(&self, query: &str) -> RequestOutcome {
        let (generation, token) = self.begin(None);

        let resolved = tokio::select! {
            biased;
            _ = token.cancelled() => return RequestOutcome::Superseded,
            result = self.source.geocode(query) => result,
        };

        match resolved {
            Ok(location) => self.select_location(location).await,
            Err(e) => self.finish(generation, query, Err(e)),
        }
    }

    pub fn clear_error(&self) {
        self.state.lock().last_error = None;
    }

    /// Cancel whatever is in flight without starting anything new.
    pub fn cancel_pending(&self) {
        let mut state = self.state.lock();
        if let Some(token) = state.cancel.take() {
            token.cancel();
            state.generation += 1;
            state.is_loading = false;
        }
    }

    async fn fetch(&self, location: Location, select: bool) -> RequestOutcome {
        let (generation, token) = self.begin(select.then_some(&location));
        tracing::info!("Requesting forecast for {} (#{})", location.name, generation);

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("Forecast request #{} superseded", generation);
                return RequestOutcome::Superseded;
            }
            result = self.source.fetch_by_coordinates(location.latitude, location.longitude) => result,
        };

        let outcome = fetched.map(|payload| {
            let now = Local::now();
            ForecastResult::from_normalized(normalize(payload, &now), now.with_timezone(&Utc))
        });
        self.finish(generation, &location.name, outcome)
    }

    /// Supersede the current request and start a new generation. The
    /// selection, when given, changes under the same lock.
    fn begin(&self, select: Option<&Location>) -> (u64, CancellationToken) {
        let mut state = self.state.lock();
        if let Some(previous) = state.cancel.take() {
            previous.cancel();
        }
        if let Some(location) = select {
            state.selected_location = location.clone();
        }
        state.generation += 1;
        state.is_loading = true;

        let token = CancellationToken::new();
        state.cancel = Some(token.clone());
        (state.generation, token)
    }

    fn finish(
        &self,
        generation: u64,
        place: &str,
        outcome: Result<ForecastResult, ForecastError>,
    ) -> RequestOutcome {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!("Discarding stale forecast result #{}", generation);
            return RequestOutcome::Superseded;
        }
        // The request is over either way; only its effect on the data differs
        state.is_loading = false;
        state.cancel = None;

        match outcome {
            Ok(result) => {
                tracing::info!(
                    "Forecast updated for {}: {} hourly, {} daily",
                    place,
                    result.hourly.len(),
                    result.daily.len()
                );
                state.last_result = Some(result);
                state.last_error = None;
                RequestOutcome::Updated
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Forecast for {} cancelled by its source", place);
                RequestOutcome::Superseded
            }
            Err(e) => {
                tracing::warn!("Forecast for {} failed: {}", place, e);
                state.last_result = Some(ForecastResult::placeholder(&Local::now()));
                state.last_error = Some(format!(
                    "Could not find weather for {}. {}",
                    place,
                    e.user_message()
                ));
                RequestOutcome::Placeholder
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureSource;
    use crate::payload::{RawCondition, RawEntry, RawForecastPayload};
    use crate::types::{ConditionSymbol, PLACEHOLDER_DAYS, PLACEHOLDER_HOURS};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn payload_with_temp(temperature: f64) -> RawForecastPayload {
        RawForecastPayload {
            entries: vec![RawEntry {
                timestamp: Utc::now() + chrono::Duration::minutes(30),
                temperature,
                humidity: Some(40),
                condition: Some(RawCondition {
                    main: Some("Clear".into()),
                    icon: Some("01d".into()),
                    description: None,
                }),
            }],
            ..RawForecastPayload::default()
        }
    }

    fn rio() -> Location {
        Location::new("Rio de Janeiro", -22.9068, -43.1729)
    }

    fn beijing() -> Location {
        Location::new("Beijing", 39.9042, 116.4074)
    }

    /// Answers by latitude sign: south slow, north fast.
    struct ByHemisphere;

    #[async_trait]
    impl WeatherSource for ByHemisphere {
        async fn fetch_by_coordinates(
            &self,
            lat: f64,
            _lon: f64,
        ) -> Result<RawForecastPayload, ForecastError> {
            if lat < 0.0 {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(payload_with_temp(30.0))
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(payload_with_temp(5.0))
            }
        }

        async fn geocode(&self, query: &str) -> Result<Location, ForecastError> {
            Err(ForecastError::NotFound(query.to_string()))
        }
    }

    #[tokio::test]
    async fn test_success_installs_result() {
        let source = Arc::new(FixtureSource::with_payload(payload_with_temp(21.4)));
        let session = ForecastSession::new(source.clone(), rio());

        let outcome = session.refresh().await;
        let snap = session.snapshot();

        assert_eq!(outcome, RequestOutcome::Updated);
        assert!(!snap.is_loading);
        assert!(!snap.is_placeholder);
        assert!(snap.error_message.is_none());
        assert!(snap.last_updated.is_some());
        assert_eq!(snap.daily[0].temperature_celsius, 21);
        assert_eq!(source.forecast_calls(), 1);
    }

    #[tokio::test]
    async fn test_network_error_installs_placeholder_and_message() {
        let source = Arc::new(FixtureSource::failing(ForecastError::Network(
            "connection refused".into(),
        )));
        let session = ForecastSession::new(source, rio());

        let outcome = session.refresh().await;
        let snap = session.snapshot();

        assert_eq!(outcome, RequestOutcome::Placeholder);
        assert!(!snap.is_loading);
        assert!(snap.is_placeholder);
        assert_eq!(snap.hourly.len(), PLACEHOLDER_HOURS);
        assert_eq!(snap.daily.len(), PLACEHOLDER_DAYS);
        assert!(snap
            .hourly
            .iter()
            .all(|h| h.condition_symbol == ConditionSymbol::Unknown && h.icon_key.is_none()));
        let message = snap.error_message.unwrap();
        assert!(message.contains("Rio de Janeiro"));
        assert!(message.contains("internet connection"));
    }

    #[tokio::test]
    async fn test_clear_error_keeps_data() {
        let source = Arc::new(FixtureSource::failing(ForecastError::Decode("bad".into())));
        let session = ForecastSession::new(source, rio());
        session.refresh().await;

        session.clear_error();
        let snap = session.snapshot();

        assert!(snap.error_message.is_none());
        assert!(snap.is_placeholder);
        assert_eq!(snap.daily.len(), PLACEHOLDER_DAYS);
    }

    /// Fails the first call, succeeds afterwards.
    #[derive(Default)]
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherSource for FlakySource {
        async fn fetch_by_coordinates(
            &self,
            _lat: f64,
            _lon: f64,
        ) -> Result<RawForecastPayload, ForecastError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ForecastError::BadResponse {
                    status: 503,
                    message: "unavailable".into(),
                })
            } else {
                Ok(payload_with_temp(10.0))
            }
        }

        async fn geocode(&self, query: &str) -> Result<Location, ForecastError> {
            Err(ForecastError::NotFound(query.to_string()))
        }
    }

    #[tokio::test]
    async fn test_refresh_after_failure_clears_error() {
        let session = ForecastSession::new(Arc::new(FlakySource::default()), rio());

        assert_eq!(session.refresh().await, RequestOutcome::Placeholder);
        assert!(session.snapshot().error_message.is_some());

        assert_eq!(session.refresh().await, RequestOutcome::Updated);
        let snap = session.snapshot();
        assert!(snap.error_message.is_none());
        assert!(!snap.is_placeholder);
        assert_eq!(snap.daily[0].temperature_celsius, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_request_to_start_wins() {
        let session = ForecastSession::new(Arc::new(ByHemisphere), rio());

        let (first, second) = tokio::join!(session.select_location(rio()), async {
            tokio::task::yield_now().await;
            session.select_location(beijing()).await
        });

        assert_eq!(first, RequestOutcome::Superseded);
        assert_eq!(second, RequestOutcome::Updated);

        let snap = session.snapshot();
        assert_eq!(snap.location.name, "Beijing");
        assert_eq!(snap.daily[0].temperature_celsius, 5);
        assert!(!snap.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_leaves_state_untouched() {
        let slow_failure = FixtureSource::failing(ForecastError::Network("timeout".into()))
            .with_delay(Duration::from_secs(5));
        let session = ForecastSession::new(Arc::new(slow_failure), rio());

        let (first, _) = tokio::join!(session.refresh(), async {
            tokio::task::yield_now().await;
            session.cancel_pending();
        });

        assert_eq!(first, RequestOutcome::Superseded);
        let snap = session.snapshot();
        assert!(snap.error_message.is_none());
        assert!(snap.last_updated.is_none());
        assert!(!snap.is_loading);
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let session = ForecastSession::new(Arc::new(FixtureSource::default()), rio());
        let (stale, _) = session.begin(None);
        let (current, _) = session.begin(None);

        let late = ForecastResult::placeholder(&Local::now());
        assert_eq!(
            session.finish(stale, "Rio de Janeiro", Ok(late)),
            RequestOutcome::Superseded
        );
        assert!(session.snapshot().last_updated.is_none());
        assert!(session.snapshot().is_loading);

        let fresh = ForecastResult::placeholder(&Local::now());
        assert_eq!(
            session.finish(current, "Rio de Janeiro", Ok(fresh)),
            RequestOutcome::Updated
        );
        assert!(!session.snapshot().is_loading);
    }

    #[test]
    fn test_selection_moves_with_its_generation() {
        let session = ForecastSession::new(Arc::new(FixtureSource::default()), rio());
        let (first, _) = session.begin(Some(&rio()));
        let (second, _) = session.begin(Some(&beijing()));

        let late = ForecastResult::placeholder(&Local::now());
        assert_eq!(
            session.finish(first, "Rio de Janeiro", Ok(late)),
            RequestOutcome::Superseded
        );
        assert_eq!(session.snapshot().location.name, "Beijing");

        let fresh = ForecastResult::placeholder(&Local::now());
        assert_eq!(
            session.finish(second, "Beijing", Ok(fresh)),
            RequestOutcome::Updated
        );
        assert_eq!(session.snapshot().location.name, "Beijing");
    }

    #[tokio::test]
    async fn test_request_forecast_keeps_selection() {
        let source = Arc::new(FixtureSource::with_payload(payload_with_temp(3.0)));
        let session = ForecastSession::new(source, rio());

        assert_eq!(
            session.request_forecast(beijing()).await,
            RequestOutcome::Updated
        );
        assert_eq!(session.selected_location().name, "Rio de Janeiro");
    }

    #[tokio::test]
    async fn test_source_cancellation_leaves_data_untouched() {
        let session = ForecastSession::new(
            Arc::new(FixtureSource::failing(ForecastError::Cancelled)),
            rio(),
        );

        assert_eq!(session.refresh().await, RequestOutcome::Superseded);

        let snap = session.snapshot();
        assert!(snap.last_updated.is_none());
        assert!(snap.hourly.is_empty());
        assert!(!snap.is_placeholder);
        assert!(snap.error_message.is_none());
        // Nothing is in flight any more
        assert!(!snap.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_flag_while_in_flight() {
        let source = FixtureSource::with_payload(payload_with_temp(12.0))
            .with_delay(Duration::from_millis(100));
        let session = ForecastSession::new(Arc::new(source), rio());

        let (outcome, was_loading) = tokio::join!(session.refresh(), async {
            tokio::task::yield_now().await;
            session.snapshot().is_loading
        });

        assert!(was_loading);
        assert_eq!(outcome, RequestOutcome::Updated);
        assert!(!session.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_search_and_select() {
        let source = FixtureSource::with_payload(payload_with_temp(18.0))
            .with_place(Location::new("Los Angeles", 34.0522, -118.2437));
        let session = ForecastSession::new(Arc::new(source), rio());

        assert_eq!(
            session.search_and_select("los angeles").await,
            RequestOutcome::Updated
        );
        assert_eq!(session.selected_location().name, "Los Angeles");

        assert_eq!(
            session.search_and_select("Atlantis").await,
            RequestOutcome::Placeholder
        );
        let snap = session.snapshot();
        assert_eq!(snap.location.name, "Los Angeles");
        assert!(snap.error_message.unwrap().contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_fall_back_to_placeholder() {
        let session = ForecastSession::new(
            Arc::new(FixtureSource::with_payload(payload_with_temp(1.0))),
            rio(),
        );

        let outcome = session
            .request_forecast(Location::new("Nowhere", 91.0, 0.0))
            .await;

        assert_eq!(outcome, RequestOutcome::Placeholder);
        assert!(session.snapshot().is_placeholder);
    }
}
