//! Forecast retrieval error types.

use thiserror::Error;

/// Errors raised by a [`WeatherSource`](crate::WeatherSource) and carried up
/// to the forecast session.
#[derive(Debug, Clone, Error)]
pub enum ForecastError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Bad response: {status} - {message}")]
    BadResponse { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Request superseded")]
    Cancelled,
}

impl ForecastError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Unable to connect. Check your internet connection.",
            Self::BadResponse { status, .. } if *status == 401 => {
                "Weather API key is invalid. Check settings."
            }
            Self::BadResponse { status, .. } if *status >= 500 => {
                "The weather service is having issues. Please try again later."
            }
            Self::BadResponse { .. } => "The weather request failed. Please try again.",
            Self::Decode(_) => "Received an unexpected response from the weather service.",
            Self::NotFound(_) => "Location not found. Check the name and try again.",
            Self::InvalidCoordinates { .. } => "That location is outside the valid range.",
            Self::Cancelled => "The request was replaced by a newer one.",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::BadResponse { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::BadResponse {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
