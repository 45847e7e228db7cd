//! Forecast retrieval for WeatherPal
//!
//! Fetches OpenWeather forecasts, normalizes them into an hourly strip and a
//! 5 day list, caches condition icons on disk, and keeps the session state a
//! presentation layer renders from.

pub mod cache;
pub mod cities;
pub mod error;
pub mod fixture;
pub mod geocode;
pub mod normalize;
pub mod payload;
pub mod provider;
pub mod session;
pub mod types;

pub use cache::{FreshnessPolicy, IconCache, IconImage};
pub use cities::{City, CityCatalog, CityEntry};
pub use error::ForecastError;
pub use fixture::FixtureSource;
pub use normalize::normalize;
pub use payload::{FeedShape, RawForecastPayload};
pub use provider::{ClientSettings, IconFetcher, OpenWeatherClient, WeatherSource};
pub use session::{ForecastSession, RequestOutcome, SessionSnapshot};
pub use types::*;
