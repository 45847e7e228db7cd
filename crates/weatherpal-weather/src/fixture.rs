//! Fixture-backed source for tests and offline runs.
//!
//! Serves one canned payload (or one canned failure) for every coordinate,
//! resolves place names from a small in-memory table, and counts calls.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ForecastError;
use crate::payload::{decode_forecast, FeedShape, RawForecastPayload};
use crate::provider::{validate_coordinates, IconFetcher, WeatherSource};
use crate::types::Location;

#[derive(Debug, Default)]
pub struct FixtureSource {
    response: Option<Result<RawForecastPayload, ForecastError>>,
    places: HashMap<String, Location>,
    icons: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    forecast_calls: AtomicUsize,
    icon_calls: AtomicUsize,
}

impl FixtureSource {
    /// Answer every forecast request with `payload`.
    pub fn with_payload(payload: RawForecastPayload) -> Self {
        Self {
            response: Some(Ok(payload)),
            ..Self::default()
        }
    }

    /// Fail every forecast request with `error`.
    pub fn failing(error: ForecastError) -> Self {
        Self {
            response: Some(Err(error)),
            ..Self::default()
        }
    }

    /// Load a recorded provider response body from disk.
    ///
    /// # Errors
    /// [`ForecastError::Decode`] if the file cannot be read or does not match `shape`.
    pub fn from_file(shape: FeedShape, path: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let body = std::fs::read(path.as_ref()).map_err(|e| {
            ForecastError::Decode(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::with_payload(decode_forecast(shape, &body)?))
    }

    /// Make `location` resolvable by its name (case-insensitive).
    pub fn with_place(mut self, location: Location) -> Self {
        self.places.insert(location.name.to_lowercase(), location);
        self
    }

    pub fn with_icon(mut self, icon_key: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.icons.insert(icon_key.into(), bytes);
        self
    }

    /// Hold every response for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn forecast_calls(&self) -> usize {
        self.forecast_calls.load(Ordering::SeqCst)
    }

    pub fn icon_calls(&self) -> usize {
        self.icon_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WeatherSource for FixtureSource {
    async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<RawForecastPayload, ForecastError> {
        validate_coordinates(lat, lon)?;
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match &self.response {
            Some(response) => response.clone(),
            None => Ok(RawForecastPayload::default()),
        }
    }

    async fn geocode(&self, query: &str) -> Result<Location, ForecastError> {
        self.places
            .get(&query.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| ForecastError::NotFound(query.to_string()))
    }
}

#[async_trait]
impl IconFetcher for FixtureSource {
    async fn fetch_icon_bytes(&self, icon_key: &str) -> Result<Vec<u8>, ForecastError> {
        self.icon_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        self.icons
            .get(icon_key)
            .cloned()
            .ok_or_else(|| ForecastError::BadResponse {
                status: 404,
                message: format!("no fixture icon for {}", icon_key),
            })
    }
}
