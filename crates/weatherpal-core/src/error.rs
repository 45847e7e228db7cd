//! Application-level error types.
//!
//! Wraps the forecast, configuration and I/O failures the app can surface
//! and maps each to a message suitable for display.

use thiserror::Error;
use weatherpal_weather::ForecastError;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Forecast(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }

    /// Recover the typed error behind an `anyhow` chain from the setup path.
    pub fn classify(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ConfigError>() {
            Ok(e) => return AppError::Config(e),
            Err(err) => err,
        };
        let err = match err.downcast::<ForecastError>() {
            Ok(e) => return AppError::Forecast(e),
            Err(err) => err,
        };
        match err.downcast::<std::io::Error>() {
            Ok(e) => AppError::Io(e),
            Err(err) => AppError::Other(err),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let errors = [
            AppError::Forecast(ForecastError::Network("down".into())),
            AppError::Forecast(ForecastError::Cancelled),
            AppError::Config(ConfigError::Invalid("x".into())),
            AppError::Io(std::io::Error::other("disk")),
            AppError::Other(anyhow::anyhow!("boom")),
        ];

        for err in &errors {
            assert!(!err.user_message().is_empty(), "{:?}", err);
        }
    }

    #[test]
    fn test_forecast_error_conversion() {
        let app_err: AppError = ForecastError::NotFound("Atlantis".into()).into();
        assert!(matches!(app_err, AppError::Forecast(ForecastError::NotFound(_))));
        assert_eq!(
            app_err.user_message(),
            "Location not found. Check the name and try again."
        );
    }

    #[test]
    fn test_classify_recovers_typed_errors() {
        let config = AppError::classify(ConfigError::Invalid("timeout".into()).into());
        assert!(matches!(config, AppError::Config(ConfigError::Invalid(_))));

        let forecast = AppError::classify(anyhow::Error::new(ForecastError::Decode("x".into())));
        assert!(matches!(forecast, AppError::Forecast(ForecastError::Decode(_))));

        let io = AppError::classify(
            anyhow::Error::new(std::io::Error::other("disk full")).context("Failed to write"),
        );
        assert!(matches!(io, AppError::Io(_)));

        let other = AppError::classify(anyhow::anyhow!("boom"));
        assert!(matches!(other, AppError::Other(_)));
        assert_eq!(
            other.user_message(),
            "An unexpected error occurred. Please try again."
        );
    }

    #[test]
    fn test_config_message_propagation() {
        let app_err = AppError::Config(ConfigError::ParseError("line 3".into()));
        assert_eq!(
            app_err.user_message(),
            "Configuration file is malformed. Check your settings."
        );
    }
}
