//! Data-source abstraction.
//!
//! Each platform implements [`SourceAdapter`]. Callers never invoke
//! `fetch_daily` directly; they go through [`collect_daily`], which turns every
//! failure into an empty series so one outage cannot block the others.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metric::{non_negative, DailyMetric, Source};
use crate::range::DateRange;

/// Why a source produced no data. Never escapes [`collect_daily`].
#[derive(Debug, Error)]
pub enum SourceUnavailable {
    #[error("credentials missing: {0}")]
    MissingCredentials(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync + 'static {
    fn source(&self) -> Source;

    /// Daily aggregates for `range`, one row per active date.
    ///
    /// Rows may spill outside `range` (timezone slippage); the aligner drops
    /// them.
    async fn fetch_daily(
        &self,
        account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailyMetric>, SourceUnavailable>;
}

/// Runs one adapter under `timeout` and applies the normalization contract.
///
/// Returns an empty series on any failure, logging a warning.
pub async fn collect_daily(
    adapter: &dyn SourceAdapter,
    account_id: &str,
    range: &DateRange,
    timeout: Duration,
) -> Vec<DailyMetric> {
    let source = adapter.source();
    let result = match tokio::time::timeout(timeout, adapter.fetch_daily(account_id, range)).await {
        Ok(result) => result,
        Err(_) => Err(SourceUnavailable::Timeout(timeout)),
    };

    match result {
        Ok(rows) => {
            let fetched = rows.len();
            let tuples = rows
                .into_iter()
                .map(|m| (m.date, m.conversions, m.conversions_value, m.cost));
            let rows = aggregate_daily(source, tuples);
            debug!(%source, fetched, days = rows.len(), "source fetch complete");
            rows
        }
        Err(e) => {
            warn!(%source, error = %e, "source unavailable, treating as no data");
            Vec::new()
        }
    }
}

/// Sums `(date, conversions, value, cost)` tuples into one row per date,
/// ascending.
pub fn aggregate_daily<I>(source: Source, rows: I) -> Vec<DailyMetric>
where
    I: IntoIterator<Item = (NaiveDate, f64, f64, f64)>,
{
    let mut by_date: BTreeMap<NaiveDate, (f64, f64, f64)> = BTreeMap::new();
    for (date, conversions, value, cost) in rows {
        let entry = by_date.entry(date).or_insert((0.0, 0.0, 0.0));
        entry.0 += non_negative(conversions);
        entry.1 += non_negative(value);
        entry.2 += non_negative(cost);
    }
    by_date
        .into_iter()
        .map(|(date, (conversions, value, cost))| {
            DailyMetric::new(date, source, conversions, value, cost)
        })
        .collect()
}

/// Serves a fixed series.
#[derive(Debug, Clone)]
pub struct StaticAdapter {
    source: Source,
    rows: Vec<DailyMetric>,
}

impl StaticAdapter {
    pub fn new(source: Source, rows: Vec<DailyMetric>) -> Self {
        Self { source, rows }
    }

    /// One row per consecutive day starting at `start`, conversions only.
    pub fn from_conversions(source: Source, start: NaiveDate, conversions: &[f64]) -> Self {
        let rows = start
            .iter_days()
            .zip(conversions)
            .map(|(date, c)| DailyMetric::new(date, source, *c, 0.0, 0.0))
            .collect();
        Self::new(source, rows)
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_daily(
        &self,
        _account_id: &str,
        _range: &DateRange,
    ) -> Result<Vec<DailyMetric>, SourceUnavailable> {
        Ok(self.rows.clone())
    }
}
