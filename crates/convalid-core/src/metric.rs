//! Per-day conversion records shared by every data source.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The platform a figure was reported by.
///
/// Declaration order is the canonical ordering used for table columns,
/// insight lines and serialized maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Google Ads' own conversion reporting.
    PrimaryAds,
    /// GA4 conversions attributed to Google Ads traffic.
    Analytics,
    /// PostHog events attributed to Google Ads traffic.
    ProductAnalytics,
}

impl Source {
    pub const ALL: [Source; 3] = [
        Source::PrimaryAds,
        Source::Analytics,
        Source::ProductAnalytics,
    ];

    /// Column prefix, e.g. `primary_ads` in `primary_ads_conversions`.
    pub fn slug(self) -> &'static str {
        match self {
            Source::PrimaryAds => "primary_ads",
            Source::Analytics => "analytics",
            Source::ProductAnalytics => "product_analytics",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::PrimaryAds => "Google Ads",
            Source::Analytics => "GA4",
            Source::ProductAnalytics => "PostHog",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Source::ALL
            .into_iter()
            .find(|s| s.slug().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One source's aggregate for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub date: NaiveDate,
    pub source: Source,
    pub conversions: f64,
    /// Currency units, not micros.
    pub conversions_value: f64,
    /// Zero for sources that do not track spend.
    pub cost: f64,
}

impl DailyMetric {
    pub fn new(
        date: NaiveDate,
        source: Source,
        conversions: f64,
        conversions_value: f64,
        cost: f64,
    ) -> Self {
        Self {
            date,
            source,
            conversions: non_negative(conversions),
            conversions_value: non_negative(conversions_value),
            cost: non_negative(cost),
        }
    }
}

/// Clamps NaN, infinities and negatives to zero.
pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        if value != 0.0 {
            tracing::debug!(value, "clamped invalid metric to zero");
        }
        0.0
    }
}
