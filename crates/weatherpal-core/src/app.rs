use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use weatherpal_weather::{
    CityCatalog, ForecastSession, IconCache, Location, OpenWeatherClient, RequestOutcome,
    SessionSnapshot,
};

use crate::Config;

/// One icon referenced by the current forecast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconStatus {
    pub key: String,
    /// Cached file, when the icon resolved.
    pub path: Option<PathBuf>,
}

/// What a single forecast run produced.
#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub outcome: RequestOutcome,
    pub snapshot: SessionSnapshot,
    pub icons: Vec<IconStatus>,
}

/// Main application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
    catalog: CityCatalog,
    session: Arc<ForecastSession>,
    icons: IconCache,
    runtime: Option<Runtime>,
}

impl App {
    /// Create a new application instance from the validated on-disk config
    pub fn new() -> Result<Self> {
        let (config, _) = Config::load_validated()?;
        Self::with_config(config)
    }

    /// Build the forecast stack for `config` without starting a runtime.
    pub fn with_config(config: Config) -> Result<Self> {
        let weather = &config.weather;

        let client = Arc::new(OpenWeatherClient::new(weather.client_settings())?);

        let catalog = match &weather.city_list {
            Some(path) if path.is_file() => CityCatalog::from_file(path)?,
            _ => CityCatalog::builtin(),
        };

        let icons = IconCache::new(
            weather.effective_icon_cache_dir(),
            weather.icon_extension.clone(),
            weather.icon_freshness,
            client.clone(),
        );

        let initial = Self::initial_location(&catalog, &weather.default_city);
        let session = Arc::new(ForecastSession::new(client, initial));

        tracing::info!(
            "Forecast stack ready: feed {:?}, {} cities, icons in {}",
            weather.feed,
            catalog.len(),
            icons.dir().display()
        );

        Ok(Self {
            config: Arc::new(config),
            catalog,
            session,
            icons,
            runtime: None,
        })
    }

    /// Start the async runtime
    pub fn initialize(&mut self) -> Result<()> {
        if self.runtime.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("weatherpal-tokio")
            .build()
            .context("Failed to create tokio runtime")?;
        self.runtime = Some(runtime);

        tracing::info!("Application initialized successfully");
        Ok(())
    }

    /// Blocking wrapper around [`App::forecast`] for synchronous callers.
    pub fn run_forecast(&self, query: Option<&str>) -> Result<ForecastReport> {
        let runtime = self
            .runtime
            .as_ref()
            .context("Application not initialized")?;
        Ok(runtime.block_on(self.forecast(query)))
    }

    /// Resolve `query` (or the default city), fetch its forecast and warm
    /// the icon cache for every icon it references.
    pub async fn forecast(&self, query: Option<&str>) -> ForecastReport {
        let outcome = match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => self.session.refresh().await,
            Some(q) => match self.resolve(q) {
                Some(location) => self.session.select_location(location).await,
                None => self.session.search_and_select(q).await,
            },
        };

        let snapshot = self.session.snapshot();
        let icons = self.resolve_icons(&snapshot).await;

        ForecastReport {
            outcome,
            snapshot,
            icons,
        }
    }

    /// Shutdown the application, abandoning anything in flight
    pub fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down application");

        self.session.cancel_pending();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_secs(2));
        }

        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &CityCatalog {
        &self.catalog
    }

    pub fn session(&self) -> &Arc<ForecastSession> {
        &self.session
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    /// Exact catalog name, else a single unambiguous search hit.
    fn resolve(&self, query: &str) -> Option<Location> {
        if let Some(entry) = self.catalog.find(query) {
            return Some(entry.location());
        }
        match self.catalog.search(query).as_slice() {
            [only] => Some(only.location()),
            _ => None,
        }
    }

    fn initial_location(catalog: &CityCatalog, default_city: &str) -> Location {
        catalog
            .find(default_city)
            .or_else(|| catalog.entries().first())
            .map(|entry| entry.location())
            .unwrap_or_else(|| weatherpal_weather::City::RioDeJaneiro.location())
    }

    async fn resolve_icons(&self, snapshot: &SessionSnapshot) -> Vec<IconStatus> {
        let keys: BTreeSet<&str> = snapshot
            .hourly
            .iter()
            .filter_map(|h| h.icon_key.as_deref())
            .chain(snapshot.daily.iter().filter_map(|d| d.icon_key.as_deref()))
            .collect();

        let mut statuses = Vec::with_capacity(keys.len());
        for key in keys {
            let image = self.icons.get_image(key).await;
            let path = self.icons.icon_path(key);
            statuses.push(IconStatus {
                key: key.to_string(),
                path: (image.is_available() && path.exists()).then_some(path),
            });
        }
        statuses
    }
}
