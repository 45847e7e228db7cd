//! Provider payloads.
//!
//! OpenWeather answers in one of two shapes: the 5 day / 3 hour `forecast`
//! list, or the `onecall` document with separate hourly and daily arrays.
//! Both are decoded into a single [`RawForecastPayload`] for the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Which forecast endpoint a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedShape {
    /// `/data/2.5/forecast`: 40 entries, one every 3 hours.
    #[default]
    ThreeHourly,
    /// `/data/3.0/onecall`: 48 hourly entries plus 8 daily aggregates.
    OneCall,
}

impl FeedShape {
    /// Upper bound on hourly samples taken from this feed.
    pub fn hourly_limit(&self) -> usize {
        match self {
            Self::ThreeHourly => 8,
            Self::OneCall => 24,
        }
    }
}

/// Provider condition block (`weather[0]`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCondition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single timestamped data point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius; for daily aggregates, the representative day temperature.
    pub temperature: f64,
    pub humidity: Option<i64>,
    pub condition: Option<RawCondition>,
}

/// Provider-shaped forecast, consumed once by [`normalize`](crate::normalize).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawForecastPayload {
    pub shape: FeedShape,
    /// Intraday entries (3-hourly or hourly).
    pub entries: Vec<RawEntry>,
    /// Daily aggregates when the provider supplies them.
    pub daily: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct ForecastListResponse {
    list: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    dt: i64,
    main: ListMain,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct ListMain {
    temp: f64,
    #[serde(default)]
    humidity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    hourly: Vec<OneCallHour>,
    daily: Vec<OneCallDay>,
}

#[derive(Debug, Deserialize)]
struct OneCallHour {
    dt: i64,
    temp: f64,
    #[serde(default)]
    humidity: Option<i64>,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct OneCallDay {
    dt: i64,
    temp: OneCallDayTemp,
    #[serde(default)]
    humidity: Option<i64>,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct OneCallDayTemp {
    day: f64,
}

fn timestamp(dt: i64) -> Result<DateTime<Utc>, ForecastError> {
    DateTime::from_timestamp(dt, 0)
        .ok_or_else(|| ForecastError::Decode(format!("timestamp out of range: {}", dt)))
}

fn entry(
    dt: i64,
    temperature: f64,
    humidity: Option<i64>,
    weather: Vec<RawCondition>,
) -> Result<RawEntry, ForecastError> {
    Ok(RawEntry {
        timestamp: timestamp(dt)?,
        temperature,
        humidity,
        condition: weather.into_iter().next(),
    })
}

/// Decode a forecast response body of the given shape.
///
/// # Errors
/// Returns [`ForecastError::Decode`] when the envelope does not match `shape`.
pub fn decode_forecast(shape: FeedShape, body: &[u8]) -> Result<RawForecastPayload, ForecastError> {
    match shape {
        FeedShape::ThreeHourly => {
            let resp: ForecastListResponse = serde_json::from_slice(body)?;
            let entries = resp
                .list
                .into_iter()
                .map(|item| entry(item.dt, item.main.temp, item.main.humidity, item.weather))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RawForecastPayload {
                shape,
                entries,
                daily: None,
            })
        }
        FeedShape::OneCall => {
            let resp: OneCallResponse = serde_json::from_slice(body)?;
            let entries = resp
                .hourly
                .into_iter()
                .map(|h| entry(h.dt, h.temp, h.humidity, h.weather))
                .collect::<Result<Vec<_>, _>>()?;
            let daily = resp
                .daily
                .into_iter()
                .map(|d| entry(d.dt, d.temp.day, d.humidity, d.weather))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RawForecastPayload {
                shape,
                entries,
                daily: Some(daily),
            })
        }
    }
}
