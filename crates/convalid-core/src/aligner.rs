//! Aligns per-source daily series onto one contiguous date axis and computes
//! variance against the primary source.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::metric::{DailyMetric, Source};
use crate::range::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct SourceValues {
    pub conversions: f64,
    pub conversions_value: f64,
    pub cost: f64,
}

/// One calendar day across all configured sources.
///
/// Serializes flat: `date`, `<source>_conversions`,
/// `<source>_conversions_value`, `<source>_cost` and `variance_<source>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub date: NaiveDate,
    /// Every configured source has an entry; missing data is zero.
    pub values: BTreeMap<Source, SourceValues>,
    /// Non-primary sources only. `None` when the primary reported zero
    /// conversions that day or the source returned nothing at all.
    pub variances: BTreeMap<Source, Option<f64>>,
}

impl AlignedRow {
    pub fn values(&self, source: Source) -> SourceValues {
        self.values.get(&source).copied().unwrap_or_default()
    }

    pub fn variance(&self, source: Source) -> Option<f64> {
        self.variances.get(&source).copied().flatten()
    }
}

impl Serialize for AlignedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.values.len() * 3 + self.variances.len()))?;
        map.serialize_entry("date", &self.date)?;
        for (source, v) in &self.values {
            map.serialize_entry(&format!("{}_conversions", source.slug()), &v.conversions)?;
            map.serialize_entry(
                &format!("{}_conversions_value", source.slug()),
                &v.conversions_value,
            )?;
            map.serialize_entry(&format!("{}_cost", source.slug()), &v.cost)?;
        }
        for (source, variance) in &self.variances {
            map.serialize_entry(&format!("variance_{}", source.slug()), variance)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AlignedTable {
    pub primary: Source,
    /// Configured sources, canonical order.
    pub sources: Vec<Source>,
    /// Configured sources that returned at least one in-range row.
    pub reporting: Vec<Source>,
    /// Ascending by date, one per day of the range. Empty when no source
    /// reported anything.
    pub rows: Vec<AlignedRow>,
}

impl AlignedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sources that carry a variance column.
    pub fn compared_sources(&self) -> Vec<Source> {
        self.rows
            .first()
            .map(|row| row.variances.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn total(&self, source: Source) -> SourceValues {
        self.rows.iter().fold(SourceValues::default(), |mut acc, row| {
            let v = row.values(source);
            acc.conversions += v.conversions;
            acc.conversions_value += v.conversions_value;
            acc.cost += v.cost;
            acc
        })
    }

    pub fn variance_series(&self, source: Source) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.variance(source)).collect()
    }

    /// Mean of the non-null variances, `None` if every day is null.
    pub fn mean_variance(&self, source: Source) -> Option<f64> {
        let defined: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|row| row.variance(source))
            .collect();
        if defined.is_empty() {
            return None;
        }
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

/// `(other - primary) / primary * 100`, rounded to two decimals.
/// Undefined when `primary` is zero.
pub fn variance_pct(other: f64, primary: f64) -> Option<f64> {
    if primary == 0.0 {
        return None;
    }
    let rounded = ((other - primary) / primary * 100.0 * 100.0).round() / 100.0;
    // Avoid emitting -0.0.
    Some(if rounded == 0.0 { 0.0 } else { rounded })
}

/// Merges `series` (keyed by configured source) into an [`AlignedTable`].
///
/// Rows outside `range` are dropped. Variance columns exist only when the
/// primary source is configured alongside at least one other source.
pub fn align(
    range: &DateRange,
    primary: Source,
    series: &BTreeMap<Source, Vec<DailyMetric>>,
) -> AlignedTable {
    let sources: Vec<Source> = series.keys().copied().collect();
    let mut lookup: BTreeMap<(Source, NaiveDate), SourceValues> = BTreeMap::new();
    let mut reporting: BTreeSet<Source> = BTreeSet::new();
    let mut dropped = 0usize;

    for (&source, rows) in series {
        for row in rows {
            if !range.contains(row.date) {
                dropped += 1;
                continue;
            }
            let entry = lookup.entry((source, row.date)).or_default();
            entry.conversions += row.conversions;
            entry.conversions_value += row.conversions_value;
            entry.cost += row.cost;
            reporting.insert(source);
        }
    }

    if dropped > 0 {
        debug!(dropped, start = %range.start(), end = %range.end(), "discarded out-of-range rows");
    }

    let reporting: Vec<Source> = reporting.into_iter().collect();
    if reporting.is_empty() {
        return AlignedTable {
            primary,
            sources,
            reporting,
            rows: Vec::new(),
        };
    }

    let compared: Vec<Source> = if series.contains_key(&primary) {
        sources.iter().copied().filter(|s| *s != primary).collect()
    } else {
        Vec::new()
    };

    let rows = range
        .days()
        .map(|date| {
            let values: BTreeMap<Source, SourceValues> = sources
                .iter()
                .map(|&s| (s, lookup.get(&(s, date)).copied().unwrap_or_default()))
                .collect();
            let primary_conversions = values
                .get(&primary)
                .map(|v| v.conversions)
                .unwrap_or(0.0);
            let variances = compared
                .iter()
                .map(|&s| {
                    let variance = if reporting.contains(&s) {
                        let other = values.get(&s).map(|v| v.conversions).unwrap_or(0.0);
                        variance_pct(other, primary_conversions)
                    } else {
                        None
                    };
                    (s, variance)
                })
                .collect();
            AlignedRow {
                date,
                values,
                variances,
            }
        })
        .collect();

    AlignedTable {
        primary,
        sources,
        reporting,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).expect("date")
    }

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(d(start), d(end)).expect("range")
    }

    fn conversions(source: Source, start: u32, values: &[f64]) -> Vec<DailyMetric> {
        values
            .iter()
            .enumerate()
            .map(|(i, c)| DailyMetric::new(d(start + i as u32), source, *c, 0.0, 0.0))
            .collect()
    }

    fn series(entries: Vec<(Source, Vec<DailyMetric>)>) -> BTreeMap<Source, Vec<DailyMetric>> {
        entries.into_iter().collect()
    }

    #[test]
    fn scenario_variances_with_null_on_zero_primary() {
        let table = align(
            &range(1, 3),
            Source::PrimaryAds,
            &series(vec![
                (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &[10.0, 20.0, 0.0])),
                (Source::Analytics, conversions(Source::Analytics, 1, &[12.0, 18.0, 5.0])),
            ]),
        );
        assert_eq!(
            table.variance_series(Source::Analytics),
            vec![Some(20.0), Some(-10.0), None]
        );
        assert_eq!(table.mean_variance(Source::Analytics), Some(5.0));
    }

    #[test]
    fn one_row_per_day_with_zero_fill() {
        let table = align(
            &range(1, 7),
            Source::PrimaryAds,
            &series(vec![
                (
                    Source::PrimaryAds,
                    vec![DailyMetric::new(d(4), Source::PrimaryAds, 3.0, 30.0, 12.5)],
                ),
                (Source::Analytics, Vec::new()),
            ]),
        );
        assert_eq!(table.rows.len(), 7);
        let dates: Vec<_> = table.rows.iter().map(|r| r.date).collect();
        let expected: Vec<_> = range(1, 7).days().collect();
        assert_eq!(dates, expected);
        for row in &table.rows {
            let v = row.values(Source::Analytics);
            assert_eq!((v.conversions, v.conversions_value, v.cost), (0.0, 0.0, 0.0));
        }
        assert_eq!(table.rows[3].values(Source::PrimaryAds).cost, 12.5);
    }

    #[test]
    fn silent_source_has_all_null_variance() {
        let table = align(
            &range(1, 3),
            Source::PrimaryAds,
            &series(vec![
                (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &[5.0, 6.0, 7.0])),
                (Source::ProductAnalytics, Vec::new()),
            ]),
        );
        assert_eq!(table.variance_series(Source::ProductAnalytics), vec![None, None, None]);
        assert_eq!(table.mean_variance(Source::ProductAnalytics), None);
        assert_eq!(table.reporting, vec![Source::PrimaryAds]);
    }

    #[test]
    fn primary_only_has_no_variance_columns() {
        let table = align(
            &range(1, 2),
            Source::PrimaryAds,
            &series(vec![(
                Source::PrimaryAds,
                conversions(Source::PrimaryAds, 1, &[1.0, 2.0]),
            )]),
        );
        assert!(table.rows.iter().all(|r| r.variances.is_empty()));
        assert!(table.compared_sources().is_empty());
    }

    #[test]
    fn identical_sources_have_exact_zero_variance() {
        let values = [3.0, 7.5, 11.0];
        let table = align(
            &range(1, 3),
            Source::PrimaryAds,
            &series(vec![
                (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &values)),
                (Source::Analytics, conversions(Source::Analytics, 1, &values)),
                (Source::ProductAnalytics, conversions(Source::ProductAnalytics, 1, &values)),
            ]),
        );
        for row in &table.rows {
            assert_eq!(row.variance(Source::Analytics), Some(0.0));
            assert_eq!(row.variance(Source::ProductAnalytics), Some(0.0));
        }
    }

    #[test]
    fn out_of_range_rows_are_discarded() {
        let table = align(
            &range(2, 3),
            Source::PrimaryAds,
            &series(vec![(
                Source::PrimaryAds,
                conversions(Source::PrimaryAds, 1, &[100.0, 1.0, 2.0, 100.0]),
            )]),
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.total(Source::PrimaryAds).conversions, 3.0);
    }

    #[test]
    fn no_in_range_data_yields_empty_table() {
        let table = align(
            &range(10, 10),
            Source::PrimaryAds,
            &series(vec![
                (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &[4.0])),
                (Source::Analytics, Vec::new()),
            ]),
        );
        assert!(table.is_empty());
        assert!(table.reporting.is_empty());
    }

    #[test]
    fn fractional_conversions_keep_precision() {
        let table = align(
            &range(1, 2),
            Source::PrimaryAds,
            &series(vec![
                (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &[0.333, 0.5])),
                (Source::Analytics, conversions(Source::Analytics, 1, &[1.0, 0.25])),
            ]),
        );
        assert_eq!(table.total(Source::PrimaryAds).conversions, 0.333 + 0.5);
        assert_eq!(table.rows[1].variance(Source::Analytics), Some(-50.0));
        assert_eq!(table.rows[0].variance(Source::Analytics), Some(200.3));
    }

    #[test]
    fn variance_pct_rounds_half_away_from_zero() {
        assert_eq!(variance_pct(1.0, 3.0), Some(-66.67));
        assert_eq!(variance_pct(5.0, 0.0), None);
        assert_eq!(variance_pct(0.0, 0.0), None);
    }

    #[test]
    fn aligned_row_serializes_flat_columns() {
        let table = align(
            &range(1, 1),
            Source::PrimaryAds,
            &series(vec![
                (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &[0.0])),
                (Source::Analytics, conversions(Source::Analytics, 1, &[2.0])),
            ]),
        );
        let json = serde_json::to_value(&table.rows[0]).expect("serialize");
        assert_eq!(json["date"], "2026-05-01");
        assert_eq!(json["analytics_conversions"], 2.0);
        assert_eq!(json["primary_ads_cost"], 0.0);
        assert!(json["variance_analytics"].is_null());
    }

    #[test]
    fn aligning_twice_is_identical() {
        let input = series(vec![
            (Source::PrimaryAds, conversions(Source::PrimaryAds, 1, &[4.0, 0.0, 9.0])),
            (Source::Analytics, conversions(Source::Analytics, 2, &[1.0, 3.0])),
        ]);
        let a = serde_json::to_string(&align(&range(1, 3), Source::PrimaryAds, &input)).expect("json");
        let b = serde_json::to_string(&align(&range(1, 3), Source::PrimaryAds, &input)).expect("json");
        assert_eq!(a, b);
    }
}
