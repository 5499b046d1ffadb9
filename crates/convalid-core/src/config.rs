use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::metric::Source;

/// Reference source every other source is compared against.
pub const PRIMARY_SOURCE: Source = Source::PrimaryAds;

/// Mean variance (percent) inside which a source "closely matches" the primary.
pub const VARIANCE_TOLERANCE_PCT: f64 = 10.0;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 45;
const MIN_FETCH_TIMEOUT_SECS: u64 = 30;
const MAX_FETCH_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_POSTHOG_HOST: &str = "https://app.posthog.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Calendar used to decide what "today" is for default date ranges.
    pub timezone: Tz,
    pub fetch_timeout_secs: u64,
    /// Account used when a request does not name one.
    pub default_customer_id: Option<String>,
    pub sources: SourcesConfig,
}

/// Which adapters are active, and the credentials each one needs.
///
/// A `None` entry means the source is not configured; that narrows the
/// comparison but is not an error.
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    pub google_ads: Option<GoogleAdsCredentials>,
    pub ga4: Option<Ga4Credentials>,
    pub posthog: Option<PostHogCredentials>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleAdsCredentials {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub login_customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ga4Credentials {
    pub property_id: String,
    /// Path to a service-account JSON key file.
    pub credentials_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostHogCredentials {
    pub api_key: String,
    pub host: String,
    pub project_id: String,
}

impl SourcesConfig {
    pub fn enabled(&self) -> Vec<Source> {
        let mut sources = Vec::new();
        if self.google_ads.is_some() {
            sources.push(Source::PrimaryAds);
        }
        if self.ga4.is_some() {
            sources.push(Source::Analytics);
        }
        if self.posthog.is_some() {
            sources.push(Source::ProductAnalytics);
        }
        sources
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            port: get("CONVALID_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            timezone: match get("CONVALID_TIMEZONE") {
                Some(raw) => raw
                    .parse::<Tz>()
                    .map_err(|e| format!("invalid CONVALID_TIMEZONE: {e}"))?,
                None => Tz::UTC,
            },
            fetch_timeout_secs: get("CONVALID_FETCH_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS)
                .clamp(MIN_FETCH_TIMEOUT_SECS, MAX_FETCH_TIMEOUT_SECS),
            default_customer_id: get("GOOGLE_ADS_CUSTOMER_ID"),
            sources: SourcesConfig {
                google_ads: match (
                    get("GOOGLE_ADS_DEVELOPER_TOKEN"),
                    get("GOOGLE_ADS_CLIENT_ID"),
                    get("GOOGLE_ADS_CLIENT_SECRET"),
                    get("GOOGLE_ADS_REFRESH_TOKEN"),
                ) {
                    (
                        Some(developer_token),
                        Some(client_id),
                        Some(client_secret),
                        Some(refresh_token),
                    ) => Some(GoogleAdsCredentials {
                        developer_token,
                        client_id,
                        client_secret,
                        refresh_token,
                        login_customer_id: get("GOOGLE_ADS_LOGIN_CUSTOMER_ID"),
                    }),
                    _ => None,
                },
                ga4: match (get("GA4_PROPERTY_ID"), get("GA4_CREDENTIALS_PATH")) {
                    (Some(property_id), Some(credentials_path)) => Some(Ga4Credentials {
                        property_id,
                        credentials_path,
                    }),
                    _ => None,
                },
                posthog: get("POSTHOG_API_KEY").map(|api_key| PostHogCredentials {
                    api_key,
                    host: get("POSTHOG_HOST")
                        .unwrap_or_else(|| DEFAULT_POSTHOG_HOST.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    project_id: get("POSTHOG_PROJECT_ID").unwrap_or_else(|| "@current".to_string()),
                }),
            },
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Today's date in the configured calendar.
    pub fn today(&self) -> NaiveDate {
        chrono::Utc::now().with_timezone(&self.timezone).date_naive()
    }
}
