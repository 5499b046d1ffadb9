//! PostHog `EventsQuery` over the project query API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use convalid_core::adapter::aggregate_daily;
use convalid_core::config::PostHogCredentials;
use convalid_core::{DailyMetric, DateRange, Source, SourceAdapter, SourceUnavailable};

use crate::http::{json_number, read_json, transport};

const PAGE_SIZE: usize = 10_000;
/// Hard stop on pagination: 50 pages of 10k events.
const MAX_PAGES: usize = 50;

const TIMESTAMP_COLUMN: &str = "timestamp";
const REVENUE_COLUMN: &str = "properties.$revenue";

pub struct PostHogAdapter {
    client: Client,
    credentials: PostHogCredentials,
}

impl PostHogAdapter {
    pub fn new(client: Client, credentials: PostHogCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/api/projects/{}/query",
            self.credentials.host.trim_end_matches('/'),
            self.credentials.project_id
        )
    }
}

#[async_trait]
impl SourceAdapter for PostHogAdapter {
    fn source(&self) -> Source {
        Source::ProductAnalytics
    }

    #[tracing::instrument(skip(self), fields(source = "product_analytics"))]
    async fn fetch_daily(
        &self,
        _account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailyMetric>, SourceUnavailable> {
        let url = self.query_url();
        let mut rows = Vec::new();

        for page in 0..MAX_PAGES {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.credentials.api_key)
                .json(&json!({ "query": events_query(range, page * PAGE_SIZE) }))
                .send()
                .await
                .map_err(transport)?;
            let body = read_json(resp).await?;
            let parsed = parse_events(&body)?;
            debug!(page, events = parsed.events, skipped = parsed.skipped, "posthog page");
            rows.extend(parsed.rows);
            if !parsed.has_more {
                break;
            }
        }

        Ok(aggregate_daily(Source::ProductAnalytics, rows))
    }
}

/// Events from Google paid traffic inside the UTC day window of `range`.
pub fn events_query(range: &DateRange, offset: usize) -> Value {
    let start = range.start().format("%Y-%m-%d");
    let end = range.end().format("%Y-%m-%d");
    json!({
        "kind": "EventsQuery",
        "select": ["event", TIMESTAMP_COLUMN, REVENUE_COLUMN],
        "where": [
            format!("timestamp >= '{start}T00:00:00Z'"),
            format!("timestamp <= '{end}T23:59:59Z'"),
            "((properties.utm_source = 'google' AND properties.utm_medium IN ('cpc', 'ppc')) OR properties.gclid IS NOT NULL)",
        ],
        "orderBy": ["timestamp ASC"],
        "limit": PAGE_SIZE,
        "offset": offset,
    })
}

#[derive(Debug, Default)]
pub struct ParsedEvents {
    /// One `(date, 1, revenue, 0)` tuple per event.
    pub rows: Vec<(NaiveDate, f64, f64, f64)>,
    pub events: usize,
    /// Events dropped for an unreadable timestamp.
    pub skipped: usize,
    pub has_more: bool,
}

/// Reads the tabular `EventsQuery` response.
///
/// `results` is a list of arrays aligned with `columns`; the event day is the
/// UTC date of its timestamp.
pub fn parse_events(body: &Value) -> Result<ParsedEvents, SourceUnavailable> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceUnavailable::Decode("query response has no results".to_string()))?;

    let column = |name: &str, fallback: usize| {
        body.get("columns")
            .and_then(Value::as_array)
            .and_then(|cols| cols.iter().position(|c| c.as_str() == Some(name)))
            .unwrap_or(fallback)
    };
    let ts_idx = column(TIMESTAMP_COLUMN, 1);
    let revenue_idx = column(REVENUE_COLUMN, 2);

    let mut parsed = ParsedEvents {
        has_more: body.get("hasMore").and_then(Value::as_bool).unwrap_or(false),
        ..ParsedEvents::default()
    };
    for event in results {
        parsed.events += 1;
        let Some(date) = event
            .get(ts_idx)
            .and_then(Value::as_str)
            .and_then(event_date)
        else {
            parsed.skipped += 1;
            continue;
        };
        parsed.rows.push((date, 1.0, json_number(event.get(revenue_idx)), 0.0));
    }
    Ok(parsed)
}

fn event_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .ok()
}
