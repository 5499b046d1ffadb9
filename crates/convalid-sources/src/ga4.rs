//! GA4 Data API `runReport`, authenticated with a service-account key.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use convalid_core::adapter::aggregate_daily;
use convalid_core::config::Ga4Credentials;
use convalid_core::{DailyMetric, DateRange, Source, SourceAdapter, SourceUnavailable};

use crate::google_ads::GOOGLE_TOKEN_URI;
use crate::http::{exchange_token, json_number, read_json, transport};

pub const GA4_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
const GA4_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;
const REPORT_ROW_LIMIT: u32 = 100_000;

/// The fields of a service-account JSON key this adapter needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

pub struct Ga4Adapter {
    client: Client,
    credentials: Ga4Credentials,
    api_base: String,
}

impl Ga4Adapter {
    pub fn new(client: Client, credentials: Ga4Credentials) -> Self {
        Self {
            client,
            credentials,
            api_base: GA4_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn load_key(&self) -> Result<ServiceAccountKey, SourceUnavailable> {
        let raw = tokio::fs::read_to_string(&self.credentials.credentials_path)
            .await
            .map_err(|e| {
                SourceUnavailable::MissingCredentials(format!(
                    "cannot read {}: {e}",
                    self.credentials.credentials_path
                ))
            })?;
        serde_json::from_str(&raw)
            .map_err(|e| SourceUnavailable::MissingCredentials(format!("invalid service account key: {e}")))
    }

    async fn access_token(&self) -> Result<String, SourceUnavailable> {
        let key = self.load_key().await?;
        let token_uri = key.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI);
        let assertion = sign_assertion(&key, token_uri, chrono::Utc::now().timestamp())?;
        exchange_token(
            &self.client,
            token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )
        .await
    }
}

#[async_trait]
impl SourceAdapter for Ga4Adapter {
    fn source(&self) -> Source {
        Source::Analytics
    }

    #[tracing::instrument(skip(self), fields(source = "analytics"))]
    async fn fetch_daily(
        &self,
        _account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailyMetric>, SourceUnavailable> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/properties/{}:runReport",
            self.api_base, self.credentials.property_id
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&report_request(range))
            .send()
            .await
            .map_err(transport)?;
        let body = read_json(resp).await?;
        let rows = parse_report(&body)?;
        Ok(aggregate_daily(Source::Analytics, rows))
    }
}

/// RS256 JWT asserting the service account for the token exchange.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    token_uri: &str,
    now: i64,
) -> Result<String, SourceUnavailable> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: GA4_SCOPE,
        aud: token_uri,
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SourceUnavailable::Auth(format!("service account private key: {e}")))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SourceUnavailable::Auth(format!("cannot sign assertion: {e}")))
}

/// Daily event count and value for sessions from Google paid search.
pub fn report_request(range: &DateRange) -> Value {
    json!({
        "dateRanges": [{
            "startDate": range.start().format("%Y-%m-%d").to_string(),
            "endDate": range.end().format("%Y-%m-%d").to_string(),
        }],
        "dimensions": [{ "name": "date" }],
        "metrics": [{ "name": "eventCount" }, { "name": "eventValue" }],
        "dimensionFilter": {
            "andGroup": {
                "expressions": [
                    {
                        "filter": {
                            "fieldName": "sessionSource",
                            "stringFilter": { "value": "google" }
                        }
                    },
                    {
                        "filter": {
                            "fieldName": "sessionMedium",
                            "inListFilter": { "values": ["cpc", "ppc"] }
                        }
                    }
                ]
            }
        },
        "limit": REPORT_ROW_LIMIT,
    })
}

/// Maps report rows to `(date, eventCount, eventValue, 0)`.
///
/// Columns are located through the response headers, so their order does not
/// matter. A report with no `rows` key is an empty result.
pub fn parse_report(body: &Value) -> Result<Vec<(NaiveDate, f64, f64, f64)>, SourceUnavailable> {
    let header_index = |key: &str| -> HashMap<String, usize> {
        body.get(key)
            .and_then(Value::as_array)
            .map(|headers| {
                headers
                    .iter()
                    .enumerate()
                    .filter_map(|(i, h)| h.get("name").and_then(Value::as_str).map(|n| (n.to_string(), i)))
                    .collect()
            })
            .unwrap_or_default()
    };
    let dims = header_index("dimensionHeaders");
    let metrics = header_index("metricHeaders");

    let Some(rows) = body.get("rows").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let date_idx = *dims
        .get("date")
        .ok_or_else(|| SourceUnavailable::Decode("report has no date dimension".to_string()))?;
    let count_idx = metrics.get("eventCount").copied();
    let value_idx = metrics.get("eventValue").copied();

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let raw_date = row
            .get("dimensionValues")
            .and_then(|v| v.get(date_idx))
            .and_then(|v| v.get("value"))
            .and_then(Value::as_str)
            .ok_or_else(|| SourceUnavailable::Decode("row missing date value".to_string()))?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d")
            .map_err(|e| SourceUnavailable::Decode(format!("bad GA4 date '{raw_date}': {e}")))?;
        let metric = |idx: Option<usize>| {
            json_number(
                idx.and_then(|i| row.get("metricValues").and_then(|v| v.get(i)))
                    .and_then(|v| v.get("value")),
            )
        };
        out.push((date, metric(count_idx), metric(value_idx), 0.0));
    }
    Ok(out)
}
