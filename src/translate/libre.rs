//! LibreTranslate HTTP client.
//! Connection pooling via reqwest, bounded request timeout, retry logic for
//! transient failures with every wait capped at `max_backoff`. Batch requests
//! are not retried on 429: the caller falls back to single requests anyway.
//! Accepts the array and single-object response shapes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{LangCode, TranslateError, TranslationProvider};

/// Public endpoint. Self-hosting is recommended for rate limits.
pub const DEFAULT_ENDPOINT: &str = "https://libretranslate.com/translate";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);
/// Upper bound on any single retry wait, whatever `Retry-After` says.
pub const MAX_BACKOFF: Duration = Duration::from_secs(4);

const MAX_429_RETRIES: u32 = 3;
const MAX_5XX_RETRIES: u32 = 2;

/// Request body. `q` is a string for single requests and an array for batches.
#[derive(Debug, Serialize)]
struct TranslateBody<'a, Q: Serialize> {
    q: Q,
    source: &'static str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

pub struct LibreTranslateClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_backoff: Duration,
}

impl LibreTranslateClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Config(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            max_backoff: MAX_BACKOFF,
        })
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<Q: Serialize>(
        &self,
        q: Q,
        target: LangCode,
        rate_limit_retries: u32,
    ) -> Result<Value, TranslateError> {
        let body = TranslateBody {
            q,
            source: "auto",
            target: target.as_str(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;
        let response = self.send_with_retry(&body, rate_limit_retries).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))
    }

    /// Send request with retry logic.
    /// 429: Retry-After or 1s/2s/4s (up to `rate_limit_retries`).
    /// 5xx: exponential backoff (max 2).
    /// Timeout: immediate retry once.
    /// Every wait is capped at `max_backoff`.
    async fn send_with_retry(
        &self,
        body: &Value,
        rate_limit_retries: u32,
    ) -> Result<reqwest::Response, TranslateError> {
        let mut attempt: u32 = 0;
        let mut timeout_retried = false;

        loop {
            let result = self.http.post(&self.endpoint).json(body).send().await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp);
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| Duration::from_secs(1 << attempt))
                        .min(self.max_backoff);
                    if attempt >= rate_limit_retries {
                        return Err(TranslateError::RateLimited {
                            retry_after_ms: wait.as_millis() as u64,
                        });
                    }
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "429 rate limited, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= MAX_5XX_RETRIES {
                        return Err(TranslateError::Api(format!(
                            "server error: {}",
                            resp.status()
                        )));
                    }
                    let wait = Duration::from_millis(500 * (1 << attempt)).min(self.max_backoff);
                    warn!(
                        attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(TranslateError::Api(format!(
                        "unexpected status {}: {}",
                        status,
                        body_text.chars().take(200).collect::<String>()
                    )));
                }
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(TranslateError::Timeout);
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => {
                    return Err(TranslateError::Api(e.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateClient {
    async fn translate_many(
        &self,
        texts: &[String],
        target: LangCode,
    ) -> Result<Vec<String>, TranslateError> {
        let value = self.post(texts, target, 0).await?;
        let out = parse_translations(value)?;
        if out.len() != texts.len() {
            return Err(TranslateError::InvalidResponse(format!(
                "expected {} translations, got {}",
                texts.len(),
                out.len()
            )));
        }
        debug!(count = out.len(), target = %target, "batch translated");
        Ok(out)
    }

    async fn translate_one(&self, text: &str, target: LangCode) -> Result<String, TranslateError> {
        let value = self.post(text, target, MAX_429_RETRIES).await?;
        let mut out = parse_translations(value)?;
        if out.len() != 1 {
            return Err(TranslateError::InvalidResponse(format!(
                "expected 1 translation, got {}",
                out.len()
            )));
        }
        Ok(out.remove(0))
    }
}

/// Accepts `[{translatedText}, ...]`, `{translatedText: "..."}` and
/// `{translatedText: ["...", ...]}`. Array items without a string become "".
pub fn parse_translations(value: Value) -> Result<Vec<String>, TranslateError> {
    fn text_of(v: &Value) -> String {
        v.as_str().unwrap_or_default().to_string()
    }

    match value {
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| item.get("translatedText").map(text_of).unwrap_or_default())
            .collect()),
        Value::Object(map) => match map.get("translatedText") {
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => Ok(items.iter().map(text_of).collect()),
            _ => Err(TranslateError::InvalidResponse(
                "missing translatedText".into(),
            )),
        },
        other => Err(TranslateError::InvalidResponse(format!(
            "unexpected response: {}",
            other.to_string().chars().take(200).collect::<String>()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::mock_http::{MockServer, Reply};
    use serde_json::json;
    use std::time::Instant;

    #[test]
    fn parses_array_of_objects() {
        let parsed = parse_translations(json!([
            { "translatedText": "३" },
            { "translatedText": 4 },
            {}
        ]))
        .unwrap();
        assert_eq!(parsed, vec!["३", "", ""]);
    }

    #[test]
    fn parses_single_object() {
        let parsed = parse_translations(json!({ "translatedText": "४" })).unwrap();
        assert_eq!(parsed, vec!["४"]);
    }

    #[test]
    fn parses_object_with_array_of_strings() {
        let parsed = parse_translations(json!({ "translatedText": ["३", "४"] })).unwrap();
        assert_eq!(parsed, vec!["३", "४"]);
    }

    #[test]
    fn rejects_malformed_shapes() {
        assert!(parse_translations(json!({ "error": "Invalid request" })).is_err());
        assert!(parse_translations(json!("plain")).is_err());
        assert!(parse_translations(json!(null)).is_err());
    }

    #[test]
    fn batch_body_uses_array_q() {
        let texts = vec!["3".to_string(), "4".to_string()];
        let body = TranslateBody {
            q: &texts,
            source: "auto",
            target: "hi",
            format: "text",
            api_key: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "q": ["3", "4"], "source": "auto", "target": "hi", "format": "text" })
        );
    }

    #[test]
    fn single_body_carries_api_key() {
        let body = TranslateBody {
            q: "3",
            source: "auto",
            target: "mr",
            format: "text",
            api_key: Some("secret"),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "q": "3", "source": "auto", "target": "mr", "format": "text", "api_key": "secret" })
        );
    }

    fn scripted_client(server: &MockServer) -> LibreTranslateClient {
        LibreTranslateClient::new(server.url("/translate"), None, Duration::from_millis(500))
            .unwrap()
            .with_max_backoff(Duration::from_millis(50))
    }

    fn pair() -> Vec<String> {
        vec!["3".to_string(), "4".to_string()]
    }

    #[tokio::test]
    async fn rate_limited_batch_is_not_retried() {
        let server =
            MockServer::always(Reply::new(429, "{}").header("Retry-After", "3600")).await;
        let client = scripted_client(&server);

        let started = Instant::now();
        let err = client.translate_many(&pair(), LangCode::Hi).await.unwrap_err();
        assert!(matches!(err, TranslateError::RateLimited { retry_after_ms: 50 }));
        assert_eq!(server.count(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn rate_limited_single_waits_are_capped() {
        let server =
            MockServer::always(Reply::new(429, "{}").header("Retry-After", "3600")).await;
        let client = scripted_client(&server);

        let started = Instant::now();
        let err = client.translate_one("3", LangCode::Hi).await.unwrap_err();
        assert!(matches!(err, TranslateError::RateLimited { .. }));
        assert_eq!(server.count(), 1 + MAX_429_RETRIES as usize);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_succeed() {
        let server = MockServer::start(|i, _| {
            if i < 2 {
                Reply::new(503, "")
            } else {
                Reply::json(200, json!({ "translatedText": "३" }))
            }
        })
        .await;
        let client = scripted_client(&server);

        assert_eq!(client.translate_one("3", LangCode::Hi).await.unwrap(), "३");
        assert_eq!(server.count(), 3);
        assert_eq!(
            server.requests()[0].json(),
            json!({ "q": "3", "source": "auto", "target": "hi", "format": "text" })
        );
    }

    #[tokio::test]
    async fn persistent_server_errors_give_up() {
        let server = MockServer::always(Reply::new(500, "boom")).await;
        let client = scripted_client(&server);

        let err = client.translate_one("3", LangCode::Hi).await.unwrap_err();
        assert!(matches!(err, TranslateError::Api(_)));
        assert_eq!(server.count(), 1 + MAX_5XX_RETRIES as usize);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server =
            MockServer::always(Reply::json(400, json!({ "error": "Invalid request" }))).await;
        let client = scripted_client(&server);

        let err = client.translate_many(&pair(), LangCode::Hi).await.unwrap_err();
        match err {
            TranslateError::Api(msg) => assert!(msg.contains("400")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(server.count(), 1);
    }

    #[tokio::test]
    async fn short_batch_response_is_rejected() {
        let server =
            MockServer::always(Reply::json(200, json!([{ "translatedText": "३" }]))).await;
        let client = scripted_client(&server);

        let err = client.translate_many(&pair(), LangCode::Hi).await.unwrap_err();
        assert!(matches!(err, TranslateError::InvalidResponse(_)));
        assert_eq!(server.requests()[0].json()["q"], json!(["3", "4"]));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let client = LibreTranslateClient::new(
            "http://127.0.0.1:9/translate",
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(client.translate_one("hello", LangCode::Hi).await.is_err());
    }
}
