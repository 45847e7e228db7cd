use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use weatherpal_weather::provider::{DEFAULT_API_BASE, DEFAULT_ICON_BASE, DEFAULT_ICON_EXTENSION};
use weatherpal_weather::{City, ClientSettings, FeedShape, FreshnessPolicy};

use crate::error::ConfigError;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const APP_DIR: &str = "weatherpal";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Forecast provider and icon cache settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeather API key; falls back to `OPENWEATHER_API_KEY` when unset
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    #[serde(default = "default_icon_extension")]
    pub icon_extension: String,

    /// Which forecast endpoint to use
    #[serde(default)]
    pub feed: FeedShape,

    /// Where icons are cached (default: the platform cache dir)
    #[serde(default)]
    pub icon_cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub icon_freshness: FreshnessPolicy,

    /// Per-request timeout; unset keeps the HTTP client default
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// City shown on startup
    #[serde(default = "default_city")]
    pub default_city: String,

    /// Optional JSON city list (`[{id, name, country, lat, lon}]`)
    #[serde(default)]
    pub city_list: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_icon_base_url() -> String {
    DEFAULT_ICON_BASE.to_string()
}

fn default_icon_extension() -> String {
    DEFAULT_ICON_EXTENSION.to_string()
}

fn default_city() -> String {
    City::RioDeJaneiro.name().to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            icon_base_url: default_icon_base_url(),
            icon_extension: default_icon_extension(),
            feed: FeedShape::default(),
            icon_cache_dir: None,
            icon_freshness: FreshnessPolicy::default(),
            request_timeout_secs: None,
            default_city: default_city(),
            city_list: None,
        }
    }
}

impl WeatherConfig {
    /// Configured key, else the environment, else empty.
    pub fn effective_api_key(&self) -> String {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default()
    }

    /// Configured icon directory, else `<cache dir>/weatherpal/icons`.
    pub fn effective_icon_cache_dir(&self) -> PathBuf {
        self.icon_cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("icons")
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_key: self.effective_api_key(),
            api_base_url: self.api_base_url.clone(),
            icon_base_url: self.icon_base_url.clone(),
            icon_extension: self.icon_extension.clone(),
            feed: self.feed,
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            config_dir,
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Created default config at {}", config_path.display());
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("{}: {}", config_path.display(), e.message()))
        })?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load()?)
    }

    /// Validate an already loaded config, logging warnings.
    pub fn validated(config: Self) -> Result<(Self, ValidationResult)> {
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        Self::validate_url(&weather.api_base_url, "weather.api_base_url", &mut result);
        Self::validate_url(&weather.icon_base_url, "weather.icon_base_url", &mut result);

        if weather.effective_api_key().is_empty() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured (set it here or via {})", API_KEY_ENV),
            );
        }

        if weather.icon_extension.is_empty()
            || !weather.icon_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            result.add_error(
                "weather.icon_extension",
                "Icon extension must be a non-empty alphanumeric suffix",
            );
        }

        if weather.request_timeout_secs == Some(0) {
            result.add_error(
                "weather.request_timeout_secs",
                "Timeout must be greater than 0 (omit it to use the default)",
            );
        }

        match &weather.city_list {
            Some(path) if !path.is_file() => {
                result.add_warning(
                    "weather.city_list",
                    format!("City list not found: {}", path.display()),
                );
            }
            Some(_) => {}
            None => {
                let known = City::ALL
                    .iter()
                    .any(|c| c.name().eq_ignore_ascii_case(weather.default_city.trim()));
                if !known {
                    result.add_warning(
                        "weather.default_city",
                        format!(
                            "'{}' is not a built-in city; it will be geocoded",
                            weather.default_city
                        ),
                    );
                }
            }
        }

        result
    }

    /// Validate a URL field
    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".to_string()))?
            .join(APP_DIR);

        Ok(config_dir.join("config.toml"))
    }
}
