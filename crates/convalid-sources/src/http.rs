use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use convalid_core::SourceUnavailable;

/// Largest error body kept in a [`SourceUnavailable::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Builds the client shared by all adapters.
///
/// `request_timeout` bounds each request; the overall fetch budget is applied
/// separately by the comparator.
pub fn build_client(request_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(request_timeout)
        .user_agent(concat!("convalid/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn transport(e: reqwest::Error) -> SourceUnavailable {
    SourceUnavailable::Transport(e.to_string())
}

/// Checks the status and decodes a JSON body.
pub(crate) async fn read_json(resp: Response) -> Result<Value, SourceUnavailable> {
    let status = resp.status();
    if !status.is_success() {
        let mut body = resp.text().await.unwrap_or_default();
        body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SourceUnavailable::Auth(format!("{status}: {body}"))
            }
            _ => SourceUnavailable::Status {
                status: status.as_u16(),
                body,
            },
        });
    }
    resp.json::<Value>()
        .await
        .map_err(|e| SourceUnavailable::Decode(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Posts an OAuth2 token request and returns the access token.
pub(crate) async fn exchange_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<String, SourceUnavailable> {
    let resp = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(transport)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SourceUnavailable::Auth(format!(
            "token exchange returned {status}: {}",
            &body[..floor_char_boundary(&body, MAX_ERROR_BODY)]
        )));
    }
    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| SourceUnavailable::Auth(format!("token response unreadable: {e}")))?;
    Ok(token.access_token)
}

/// Reads a metric that APIs encode either as a JSON number or as a numeric
/// string (int64 fields). Missing or unparsable values read as zero.
pub(crate) fn json_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_number_reads_numbers_and_strings() {
        let v = json!({ "a": 1.5, "b": "1230000", "c": null, "d": "n/a" });
        assert_eq!(json_number(v.get("a")), 1.5);
        assert_eq!(json_number(v.get("b")), 1_230_000.0);
        assert_eq!(json_number(v.get("c")), 0.0);
        assert_eq!(json_number(v.get("d")), 0.0);
        assert_eq!(json_number(v.get("missing")), 0.0);
    }

    #[test]
    fn char_boundary_never_splits_multibyte() {
        let s = "ééé";
        assert_eq!(floor_char_boundary(s, 3), 2);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }
}
