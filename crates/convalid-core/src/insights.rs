use crate::aligner::AlignedTable;
use crate::config::VARIANCE_TOLERANCE_PCT;
use crate::metric::Source;

pub const NO_DATA_INSIGHT: &str = "No conversion data available for comparison.";

/// Plain-language findings for `table`, in a fixed order: availability,
/// per-source totals, then mean variance per compared source.
pub fn generate_insights(table: &AlignedTable) -> Vec<String> {
    if table.is_empty() {
        return vec![NO_DATA_INSIGHT.to_string()];
    }

    let primary = table.primary.label();
    let mut insights = Vec::new();

    let labels: Vec<&str> = table.reporting.iter().map(|s| s.label()).collect();
    insights.push(format!("Data available from: {}", labels.join(", ")));

    for &source in &table.reporting {
        let total = format_total(table.total(source).conversions);
        if source == table.primary {
            insights.push(format!("{primary} reported {total} total conversions"));
        } else {
            insights.push(format!(
                "{} attributed {total} conversions to {primary}",
                source.label()
            ));
        }
    }

    for source in table.compared_sources() {
        if let Some(mean) = table.mean_variance(source) {
            insights.push(variance_insight(source, mean, primary));
        }
    }

    insights
}

fn variance_insight(source: Source, mean: f64, primary: &str) -> String {
    let label = source.label();
    if mean.abs() < VARIANCE_TOLERANCE_PCT {
        format!("{label} data closely matches {primary} ({mean:+.1}% avg variance)")
    } else if mean > 0.0 {
        format!("{label} showing {mean:.1}% higher conversions than {primary}")
    } else {
        format!(
            "{label} showing {:.1}% lower conversions than {primary}",
            mean.abs()
        )
    }
}

/// Whole numbers without decimals, fractional totals with two.
fn format_total(total: f64) -> String {
    if total.fract() == 0.0 {
        format!("{total:.0}")
    } else {
        format!("{total:.2}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::aligner::align;
    use crate::metric::DailyMetric;
    use crate::range::DateRange;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).expect("date")
    }

    fn table(entries: Vec<(Source, Vec<f64>)>, days: u32) -> AlignedTable {
        let series: BTreeMap<Source, Vec<DailyMetric>> = entries
            .into_iter()
            .map(|(source, values)| {
                let rows = values
                    .iter()
                    .enumerate()
                    .map(|(i, c)| DailyMetric::new(d(1 + i as u32), source, *c, 0.0, 0.0))
                    .collect();
                (source, rows)
            })
            .collect();
        let range = DateRange::new(d(1), d(days)).expect("range");
        align(&range, Source::PrimaryAds, &series)
    }

    #[test]
    fn empty_table_yields_single_no_data_insight() {
        let t = table(vec![(Source::PrimaryAds, vec![]), (Source::Analytics, vec![])], 1);
        assert_eq!(generate_insights(&t), vec![NO_DATA_INSIGHT.to_string()]);
    }

    #[test]
    fn scenario_mean_five_closely_matches() {
        let t = table(
            vec![
                (Source::PrimaryAds, vec![10.0, 20.0, 0.0]),
                (Source::Analytics, vec![12.0, 18.0, 5.0]),
            ],
            3,
        );
        let insights = generate_insights(&t);
        assert_eq!(
            insights,
            vec![
                "Data available from: Google Ads, GA4".to_string(),
                "Google Ads reported 30 total conversions".to_string(),
                "GA4 attributed 35 conversions to Google Ads".to_string(),
                "GA4 data closely matches Google Ads (+5.0% avg variance)".to_string(),
            ]
        );
    }

    #[test]
    fn identical_sources_closely_match() {
        let values = vec![4.0, 8.0];
        let t = table(
            vec![
                (Source::PrimaryAds, values.clone()),
                (Source::Analytics, values.clone()),
                (Source::ProductAnalytics, values),
            ],
            2,
        );
        let insights = generate_insights(&t);
        assert!(insights.contains(&"GA4 data closely matches Google Ads (+0.0% avg variance)".to_string()));
        assert!(insights
            .contains(&"PostHog data closely matches Google Ads (+0.0% avg variance)".to_string()));
    }

    #[test]
    fn higher_and_lower_bands() {
        let t = table(
            vec![
                (Source::PrimaryAds, vec![10.0, 10.0]),
                (Source::Analytics, vec![15.0, 12.0]),
                (Source::ProductAnalytics, vec![5.0, 8.0]),
            ],
            2,
        );
        let insights = generate_insights(&t);
        assert!(insights.contains(&"GA4 showing 35.0% higher conversions than Google Ads".to_string()));
        assert!(insights.contains(&"PostHog showing 35.0% lower conversions than Google Ads".to_string()));
    }

    #[test]
    fn band_edges_are_not_within_tolerance() {
        assert_eq!(
            variance_insight(Source::Analytics, 10.0, "Google Ads"),
            "GA4 showing 10.0% higher conversions than Google Ads"
        );
        assert_eq!(
            variance_insight(Source::Analytics, -10.0, "Google Ads"),
            "GA4 showing 10.0% lower conversions than Google Ads"
        );
        assert_eq!(
            variance_insight(Source::Analytics, -9.99, "Google Ads"),
            "GA4 data closely matches Google Ads (-10.0% avg variance)"
        );
    }

    #[test]
    fn silent_source_gets_no_variance_insight() {
        let t = table(
            vec![
                (Source::PrimaryAds, vec![3.0, 4.0]),
                (Source::ProductAnalytics, vec![]),
            ],
            2,
        );
        let insights = generate_insights(&t);
        assert_eq!(
            insights,
            vec![
                "Data available from: Google Ads".to_string(),
                "Google Ads reported 7 total conversions".to_string(),
            ]
        );
    }

    #[test]
    fn fractional_totals_print_two_decimals() {
        let t = table(vec![(Source::PrimaryAds, vec![1.25, 2.5])], 2);
        assert!(generate_insights(&t).contains(&"Google Ads reported 3.75 total conversions".to_string()));
    }
}
