use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Number of hourly slots in a placeholder result.
pub const PLACEHOLDER_HOURS: usize = 8;
/// Number of daily slots in a placeholder result.
pub const PLACEHOLDER_DAYS: usize = 5;
/// Description shown on placeholder days.
pub const PLACEHOLDER_DESCRIPTION: &str = "No data";

/// Semantic weather symbol derived from the provider's icon code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionSymbol {
    Clear,
    #[default]
    PartlyCloudy,
    Cloudy,
    Rain,
    Thunderstorm,
    Snow,
    Fog,
    /// "No data" marker used by placeholder results.
    Unknown,
}

impl ConditionSymbol {
    /// Map an OpenWeather icon code (e.g. `"10d"`) by its two-character prefix.
    /// See: https://openweathermap.org/weather-conditions#Icon-list
    pub fn from_icon_code(code: &str) -> Self {
        match code.get(..2) {
            Some("01") => Self::Clear,
            Some("02") => Self::PartlyCloudy,
            Some("03") | Some("04") => Self::Cloudy,
            Some("09") | Some("10") => Self::Rain,
            Some("11") => Self::Thunderstorm,
            Some("13") => Self::Snow,
            Some("50") => Self::Fog,
            _ => Self::PartlyCloudy, // Unknown codes fall back to partly cloudy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly-cloudy",
            Self::Cloudy => "cloudy",
            Self::Rain => "rain",
            Self::Thunderstorm => "thunderstorm",
            Self::Snow => "snow",
            Self::Fog => "fog",
            Self::Unknown => "unknown",
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Fog => "Fog",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ConditionSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named geographic point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// One entry of the "next hours" strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlySample {
    pub hour_of_day: u8,
    pub temperature_celsius: i32,
    pub humidity_percent: u8,
    pub condition_symbol: ConditionSymbol,
    pub icon_key: Option<String>,
}

impl HourlySample {
    pub fn placeholder(hour_of_day: u8) -> Self {
        Self {
            hour_of_day,
            temperature_celsius: 0,
            humidity_percent: 0,
            condition_symbol: ConditionSymbol::Unknown,
            icon_key: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.condition_symbol == ConditionSymbol::Unknown
    }
}

/// One entry of the "next 5 days" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySample {
    /// Abbreviated weekday name ("Mon").
    pub label: String,
    pub description: String,
    pub temperature_celsius: i32,
    pub condition_symbol: ConditionSymbol,
    pub icon_key: Option<String>,
}

impl DailySample {
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: PLACEHOLDER_DESCRIPTION.to_string(),
            temperature_celsius: 0,
            condition_symbol: ConditionSymbol::Unknown,
            icon_key: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.condition_symbol == ConditionSymbol::Unknown
    }
}

/// Output of the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedForecast {
    pub hourly: Vec<HourlySample>,
    pub daily: Vec<DailySample>,
}

/// The forecast currently shown by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub hourly: Vec<HourlySample>,
    pub daily: Vec<DailySample>,
    pub fetched_at: DateTime<Utc>,
    /// True when the samples are the "no data" sentinel set.
    #[serde(default)]
    pub is_placeholder: bool,
}

impl ForecastResult {
    pub fn from_normalized(forecast: NormalizedForecast, fetched_at: DateTime<Utc>) -> Self {
        Self {
            hourly: forecast.hourly,
            daily: forecast.daily,
            fetched_at,
            is_placeholder: false,
        }
    }

    /// Sentinel-filled result keeping the UI shape: the next
    /// [`PLACEHOLDER_HOURS`] hours and the next [`PLACEHOLDER_DAYS`] weekdays
    /// starting at `now`.
    pub fn placeholder<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let hourly = (0..PLACEHOLDER_HOURS as u32)
            .map(|i| HourlySample::placeholder(((now.hour() + 1 + i) % 24) as u8))
            .collect();

        let today = now.date_naive();
        let daily = (0..PLACEHOLDER_DAYS as i64)
            .map(|offset| {
                let date = today + Duration::days(offset);
                DailySample::placeholder(date.format("%a").to_string())
            })
            .collect();

        Self {
            hourly,
            daily,
            fetched_at: now.with_timezone(&Utc),
            is_placeholder: true,
        }
    }
}
