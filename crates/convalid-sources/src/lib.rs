//! HTTP adapters for the three conversion sources.

pub mod ga4;
pub mod google_ads;
pub mod http;
pub mod posthog;

use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use convalid_core::config::SourcesConfig;
use convalid_core::SourceAdapter;

pub use ga4::Ga4Adapter;
pub use google_ads::GoogleAdsAdapter;
pub use posthog::PostHogAdapter;

/// One adapter per configured source, sharing `client`.
pub fn build_adapters(config: &SourcesConfig, client: &Client) -> Vec<Arc<dyn SourceAdapter>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if let Some(creds) = &config.google_ads {
        adapters.push(Arc::new(GoogleAdsAdapter::new(client.clone(), creds.clone())));
    }
    if let Some(creds) = &config.ga4 {
        adapters.push(Arc::new(Ga4Adapter::new(client.clone(), creds.clone())));
    }
    if let Some(creds) = &config.posthog {
        adapters.push(Arc::new(PostHogAdapter::new(client.clone(), creds.clone())));
    }

    let sources: Vec<_> = adapters.iter().map(|a| a.source()).collect();
    info!(?sources, "conversion sources configured");
    adapters
}
