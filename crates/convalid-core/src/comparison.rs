use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::adapter::{collect_daily, SourceAdapter};
use crate::aligner::{align, AlignedTable};
use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, PRIMARY_SOURCE};
use crate::error::CoreError;
use crate::insights::generate_insights;
use crate::metric::{DailyMetric, Source};
use crate::range::DateRange;

/// Everything one validation request produces. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub customer_id: String,
    pub date_range: DateRange,
    pub comparison: AlignedTable,
    pub insights: Vec<String>,
    /// Raw per-source series as the adapters returned them, for charting.
    pub series: BTreeMap<Source, Vec<DailyMetric>>,
}

impl ComparisonResult {
    pub fn build(
        customer_id: &str,
        range: DateRange,
        primary: Source,
        series: BTreeMap<Source, Vec<DailyMetric>>,
    ) -> Self {
        let comparison = align(&range, primary, &series);
        let insights = generate_insights(&comparison);
        Self {
            customer_id: customer_id.to_string(),
            date_range: range,
            comparison,
            insights,
            series,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.comparison.is_empty()
    }
}

/// Fans out to every configured adapter, then aligns whatever came back.
pub struct Comparator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    primary: Source,
    fetch_timeout: Duration,
}

impl Comparator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            adapters,
            primary: PRIMARY_SOURCE,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Configured sources in canonical order.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.adapters.iter().map(|a| a.source()).collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Resolves optional dates against `today`, then compares.
    pub async fn validate(
        &self,
        customer_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<ComparisonResult, CoreError> {
        let range = DateRange::resolve(start, end, today)?;
        Ok(self.compare(customer_id, range).await)
    }

    /// Fetches all sources concurrently and builds the result.
    ///
    /// Dropping the returned future aborts in-flight fetches.
    pub async fn compare(&self, customer_id: &str, range: DateRange) -> ComparisonResult {
        let mut series: BTreeMap<Source, Vec<DailyMetric>> =
            self.sources().into_iter().map(|s| (s, Vec::new())).collect();

        let mut tasks = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let customer_id = customer_id.to_string();
            let timeout = self.fetch_timeout;
            tasks.spawn(async move {
                let source = adapter.source();
                let rows = collect_daily(adapter.as_ref(), &customer_id, &range, timeout).await;
                (source, rows)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, rows)) => series.entry(source).or_default().extend(rows),
                Err(e) => warn!(error = %e, "source fetch task failed"),
            }
        }

        for rows in series.values_mut() {
            rows.sort_by_key(|r| r.date);
        }

        let result = ComparisonResult::build(customer_id, range, self.primary, series);
        info!(
            customer_id,
            start = %range.start(),
            end = %range.end(),
            reporting = ?result.comparison.reporting,
            rows = result.comparison.rows.len(),
            "conversion comparison complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::adapter::{SourceUnavailable, StaticAdapter};
    use crate::insights::NO_DATA_INSIGHT;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).expect("date")
    }

    struct PanickingAdapter;

    #[async_trait]
    impl SourceAdapter for PanickingAdapter {
        fn source(&self) -> Source {
            Source::ProductAnalytics
        }

        async fn fetch_daily(
            &self,
            _account_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<DailyMetric>, SourceUnavailable> {
            panic!("adapter bug");
        }
    }

    struct UnconfiguredAdapter;

    #[async_trait]
    impl SourceAdapter for UnconfiguredAdapter {
        fn source(&self) -> Source {
            Source::Analytics
        }

        async fn fetch_daily(
            &self,
            _account_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<DailyMetric>, SourceUnavailable> {
            Err(SourceUnavailable::MissingCredentials("GA4_PROPERTY_ID".to_string()))
        }
    }

    #[tokio::test]
    async fn three_sources_are_joined() {
        let comparator = Comparator::new(vec![
            Arc::new(StaticAdapter::from_conversions(Source::PrimaryAds, d(1), &[10.0, 20.0, 0.0])),
            Arc::new(StaticAdapter::from_conversions(Source::Analytics, d(1), &[12.0, 18.0, 5.0])),
            Arc::new(StaticAdapter::from_conversions(
                Source::ProductAnalytics,
                d(1),
                &[10.0, 20.0, 1.0],
            )),
        ]);
        let range = DateRange::new(d(1), d(3)).expect("range");
        let result = comparator.compare("123-456-7890", range).await;

        assert_eq!(result.comparison.rows.len(), 3);
        assert_eq!(result.comparison.reporting, Source::ALL.to_vec());
        assert_eq!(
            result.comparison.variance_series(Source::ProductAnalytics),
            vec![Some(0.0), Some(0.0), None]
        );
        assert_eq!(result.series[&Source::Analytics].len(), 3);
        assert_eq!(result.insights[0], "Data available from: Google Ads, GA4, PostHog");
    }

    #[tokio::test]
    async fn failed_sources_do_not_block_others() {
        let comparator = Comparator::new(vec![
            Arc::new(StaticAdapter::from_conversions(Source::PrimaryAds, d(1), &[4.0, 6.0])),
            Arc::new(UnconfiguredAdapter),
            Arc::new(PanickingAdapter),
        ]);
        let range = DateRange::new(d(1), d(2)).expect("range");
        let result = comparator.compare("1", range).await;

        assert!(result.has_data());
        assert_eq!(result.comparison.sources, Source::ALL.to_vec());
        assert_eq!(result.comparison.reporting, vec![Source::PrimaryAds]);
        assert_eq!(result.comparison.variance_series(Source::Analytics), vec![None, None]);
        assert!(result.series[&Source::ProductAnalytics].is_empty());
    }

    #[tokio::test]
    async fn single_empty_day_yields_no_data_result() {
        let comparator = Comparator::new(vec![
            Arc::new(StaticAdapter::new(Source::PrimaryAds, Vec::new())),
            Arc::new(StaticAdapter::new(Source::Analytics, Vec::new())),
            Arc::new(StaticAdapter::new(Source::ProductAnalytics, Vec::new())),
        ]);
        let result = comparator.compare("1", DateRange::single_day(d(9))).await;
        assert!(!result.has_data());
        assert!(result.comparison.rows.is_empty());
        assert_eq!(result.insights, vec![NO_DATA_INSIGHT.to_string()]);
    }

    #[tokio::test]
    async fn validate_rejects_inverted_range() {
        let comparator = Comparator::new(Vec::new());
        let err = comparator
            .validate("1", Some(d(5)), Some(d(4)), d(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn repeated_comparisons_serialize_identically() {
        let comparator = Comparator::new(vec![
            Arc::new(StaticAdapter::from_conversions(Source::PrimaryAds, d(1), &[2.5, 0.0])),
            Arc::new(StaticAdapter::from_conversions(Source::Analytics, d(2), &[1.0])),
        ]);
        let range = DateRange::new(d(1), d(2)).expect("range");
        let a = serde_json::to_string(&comparator.compare("1", range).await).expect("json");
        let b = serde_json::to_string(&comparator.compare("1", range).await).expect("json");
        assert_eq!(a, b);
    }
}
