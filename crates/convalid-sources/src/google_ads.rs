//! Google Ads reporting via the REST `searchStream` endpoint.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::{json, Value};

use convalid_core::adapter::aggregate_daily;
use convalid_core::config::GoogleAdsCredentials;
use convalid_core::{DailyMetric, DateRange, Source, SourceAdapter, SourceUnavailable};

use crate::http::{exchange_token, json_number, read_json, transport};

pub const GOOGLE_ADS_API_BASE: &str = "https://googleads.googleapis.com/v17";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const MICROS_PER_UNIT: f64 = 1_000_000.0;

pub struct GoogleAdsAdapter {
    client: Client,
    credentials: GoogleAdsCredentials,
    api_base: String,
    token_uri: String,
}

impl GoogleAdsAdapter {
    pub fn new(client: Client, credentials: GoogleAdsCredentials) -> Self {
        Self {
            client,
            credentials,
            api_base: GOOGLE_ADS_API_BASE.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        }
    }

    /// Points the adapter at alternate API and token endpoints.
    pub fn with_endpoints(mut self, api_base: &str, token_uri: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.token_uri = token_uri.to_string();
        self
    }

    async fn access_token(&self) -> Result<String, SourceUnavailable> {
        exchange_token(
            &self.client,
            &self.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ],
        )
        .await
    }
}

#[async_trait]
impl SourceAdapter for GoogleAdsAdapter {
    fn source(&self) -> Source {
        Source::PrimaryAds
    }

    #[tracing::instrument(skip(self), fields(source = "primary_ads"))]
    async fn fetch_daily(
        &self,
        account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailyMetric>, SourceUnavailable> {
        let customer_id = normalize_customer_id(account_id);
        if customer_id.is_empty() {
            return Err(SourceUnavailable::MissingCredentials(
                "Google Ads customer id".to_string(),
            ));
        }

        let token = self.access_token().await?;
        let url = format!(
            "{}/customers/{}/googleAds:searchStream",
            self.api_base, customer_id
        );

        let mut req = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("developer-token", &self.credentials.developer_token)
            .json(&json!({ "query": build_query(range) }));
        if let Some(login) = &self.credentials.login_customer_id {
            req = req.header("login-customer-id", normalize_customer_id(login));
        }

        let body = read_json(req.send().await.map_err(transport)?).await?;
        let rows = parse_search_stream(&body)?;
        Ok(aggregate_daily(Source::PrimaryAds, rows))
    }
}

/// `123-456-7890` → `1234567890`.
pub fn normalize_customer_id(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// GAQL for campaign-level daily conversions over `range`.
pub fn build_query(range: &DateRange) -> String {
    format!(
        "SELECT segments.date, metrics.conversions, metrics.conversions_value, metrics.cost_micros \
         FROM campaign \
         WHERE segments.date BETWEEN '{}' AND '{}'",
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d"),
    )
}

/// Flattens the `searchStream` batches into `(date, conversions, value, cost)`.
///
/// One tuple per campaign-day; the caller sums them per day.
pub fn parse_search_stream(
    body: &Value,
) -> Result<Vec<(NaiveDate, f64, f64, f64)>, SourceUnavailable> {
    let batches = match body {
        Value::Array(batches) => batches.as_slice(),
        // A single non-streamed page.
        Value::Object(_) => std::slice::from_ref(body),
        _ => {
            return Err(SourceUnavailable::Decode(
                "searchStream response is neither an array nor an object".to_string(),
            ))
        }
    };

    let mut rows = Vec::new();
    for batch in batches {
        let Some(results) = batch.get("results").and_then(Value::as_array) else {
            continue;
        };
        for result in results {
            let raw_date = result
                .pointer("/segments/date")
                .and_then(Value::as_str)
                .ok_or_else(|| SourceUnavailable::Decode("row missing segments.date".to_string()))?;
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                SourceUnavailable::Decode(format!("bad segments.date '{raw_date}': {e}"))
            })?;
            let metrics = result.get("metrics");
            let metric = |name: &str| json_number(metrics.and_then(|m| m.get(name)));
            rows.push((
                date,
                metric("conversions"),
                metric("conversionsValue"),
                metric("costMicros") / MICROS_PER_UNIT,
            ));
        }
    }
    Ok(rows)
}
