use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use convalid_core::{config::Config, Comparator, Source};

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Holds one adapter per configured source. Stateless between requests.
    pub comparator: Comparator,
}

impl AppState {
    pub fn new(config: Config, comparator: Comparator) -> Self {
        Self {
            config: Arc::new(config),
            comparator,
        }
    }

    /// Wires the HTTP adapters for every source that has credentials.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = convalid_sources::http::build_client(config.fetch_timeout())
            .context("failed to build HTTP client")?;
        let adapters = convalid_sources::build_adapters(&config.sources, &client);
        let comparator = Comparator::new(adapters).with_fetch_timeout(config.fetch_timeout());
        Ok(Self::new(config, comparator))
    }

    pub fn enabled_sources(&self) -> Vec<Source> {
        self.comparator.sources()
    }

    /// The request's account, or the configured default.
    pub fn customer_id(&self, requested: Option<&str>) -> Option<String> {
        requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_customer_id.clone())
    }

    pub fn today(&self) -> NaiveDate {
        self.config.today()
    }
}
