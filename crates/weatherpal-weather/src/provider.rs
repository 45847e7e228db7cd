//! OpenWeather HTTP client and the source traits the session and icon cache
//! are written against.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use crate::error::ForecastError;
use crate::geocode::{decode_geocode, GEOCODE_PATH};
use crate::payload::{decode_forecast, FeedShape, RawForecastPayload};
use crate::types::Location;

pub const DEFAULT_API_BASE: &str = "https://api.openweathermap.org";
pub const DEFAULT_ICON_BASE: &str = "https://openweathermap.org/img/wn";
pub const DEFAULT_ICON_EXTENSION: &str = "png";

const FORECAST_PATH: &str = "/data/2.5/forecast";
const ONE_CALL_PATH: &str = "/data/3.0/onecall";
const USER_AGENT: &str = concat!("WeatherPal/", env!("CARGO_PKG_VERSION"));

/// Forecast provider contract.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the raw forecast for a coordinate pair.
    async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<RawForecastPayload, ForecastError>;

    /// Resolve free text to the best-ranked location.
    async fn geocode(&self, query: &str) -> Result<Location, ForecastError>;

    /// Geocode, then fetch. A geocoding failure never reaches the forecast call.
    async fn fetch_by_place_name(&self, query: &str) -> Result<RawForecastPayload, ForecastError> {
        let location = self.geocode(query).await?;
        self.fetch_by_coordinates(location.latitude, location.longitude)
            .await
    }
}

/// Icon asset provider contract. Bytes are returned undecoded.
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch_icon_bytes(&self, icon_key: &str) -> Result<Vec<u8>, ForecastError>;
}

/// Reject coordinates outside `[-90, 90]` x `[-180, 180]` (NaN included).
///
/// # Errors
/// [`ForecastError::InvalidCoordinates`] when either value is out of range.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ForecastError> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(ForecastError::InvalidCoordinates { lat, lon })
    }
}

/// Connection settings for [`OpenWeatherClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub api_base_url: String,
    pub icon_base_url: String,
    pub icon_extension: String,
    pub feed: FeedShape,
    /// `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            icon_base_url: DEFAULT_ICON_BASE.to_string(),
            icon_extension: DEFAULT_ICON_EXTENSION.to_string(),
            feed: FeedShape::default(),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Arc<Client>,
    settings: ClientSettings,
}

impl OpenWeatherClient {
    /// # Errors
    /// Returns [`ForecastError::Network`] if the HTTP client cannot be built.
    pub fn new(settings: ClientSettings) -> Result<Self, ForecastError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ForecastError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            settings,
        })
    }

    pub fn feed(&self) -> FeedShape {
        self.settings.feed
    }

    /// `{icon_base}/{icon_key}@2x.{ext}`
    pub fn icon_url(&self, icon_key: &str) -> String {
        format!(
            "{}/{}@2x.{}",
            self.settings.icon_base_url.trim_end_matches('/'),
            icon_key,
            self.settings.icon_extension
        )
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base_url.trim_end_matches('/'), path)
    }

    /// Issue a GET and fail on any non-success status.
    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ForecastError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!("{} returned status {}", url, status);
            Err(ForecastError::BadResponse {
                status: status.as_u16(),
                message,
            })
        }
    }

    #[instrument(skip(self), level = "info")]
    async fn forecast(&self, lat: f64, lon: f64) -> Result<RawForecastPayload, ForecastError> {
        validate_coordinates(lat, lon)?;

        let feed = self.settings.feed;
        let mut query = vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("units", "metric".to_string()),
            ("appid", self.settings.api_key.clone()),
        ];
        let path = match feed {
            FeedShape::ThreeHourly => FORECAST_PATH,
            FeedShape::OneCall => {
                query.push(("exclude", "minutely,alerts".to_string()));
                ONE_CALL_PATH
            }
        };

        let response = self.get(&self.api_url(path), &query).await?;
        let body = response.bytes().await?;
        let payload = decode_forecast(feed, &body)?;

        tracing::info!(
            "Forecast fetched: {} entries ({:?})",
            payload.entries.len(),
            feed
        );
        Ok(payload)
    }

    #[instrument(skip(self), level = "info")]
    async fn geocode_direct(&self, query: &str) -> Result<Location, ForecastError> {
        let params = [
            ("q", query.to_string()),
            ("limit", "1".to_string()),
            ("appid", self.settings.api_key.clone()),
        ];
        let response = self.get(&self.api_url(GEOCODE_PATH), &params).await?;
        let body = response.bytes().await?;
        decode_geocode(query, &body)
    }

    #[instrument(skip(self), level = "debug")]
    async fn icon(&self, icon_key: &str) -> Result<Vec<u8>, ForecastError> {
        let response = self.get(&self.icon_url(icon_key), &[]).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<RawForecastPayload, ForecastError> {
        self.forecast(lat, lon).await
    }

    async fn geocode(&self, query: &str) -> Result<Location, ForecastError> {
        self.geocode_direct(query).await
    }
}

#[async_trait]
impl IconFetcher for OpenWeatherClient {
    async fn fetch_icon_bytes(&self, icon_key: &str) -> Result<Vec<u8>, ForecastError> {
        self.icon(icon_key).await
    }
}
