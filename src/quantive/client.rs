use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Url};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::quantive::models::{sessions_from_value, Session};
use crate::quantive::transport::{ReqwestTransport, Transport};
use crate::shared::error::{QuantiveError, Result};

pub const DEFAULT_BASE_URL: &str = "https://app.us.quantive.com/results/api/v1";
pub const ACCOUNT_ID_HEADER: &str = "gtmhub-accountid";

/// Retry behaviour for transient failures (429, 5xx, transport errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub retry_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            retry_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

pub struct QuantiveClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    headers: header::HeaderMap,
    retry: RetryPolicy,
}

impl QuantiveClient {
    pub fn new(api_token: &str, account_id: &str) -> Result<Self> {
        Self::with_transport(api_token, account_id, Arc::new(ReqwestTransport::new()?))
    }

    pub fn with_transport(
        api_token: &str,
        account_id: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            headers: Self::default_headers(api_token, account_id)?,
            retry: RetryPolicy::none(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn default_headers(token: &str, account_id: &str) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| QuantiveError::InvalidHeader("Authorization"))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::HeaderName::from_static(ACCOUNT_ID_HEADER),
            header::HeaderValue::from_str(account_id)
                .map_err(|_| QuantiveError::InvalidHeader("Gtmhub-AccountId"))?,
        );
        Ok(headers)
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.get_once(&url).await {
                Err(err) if err.is_transient() && attempt < self.retry.retries => {
                    attempt += 1;
                    let delay = match &err {
                        QuantiveError::Http { status: 429, .. } => self.retry.rate_limit_delay,
                        _ => self.retry.retry_delay,
                    };
                    warn!(%url, attempt, ?delay, error = %err, "retrying Quantive request");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn get_once(&self, url: &Url) -> Result<Value> {
        trace!(%url, "requesting Quantive endpoint");
        let response = self.transport.get(url, &self.headers).await?;

        if !(200..=299).contains(&response.status) {
            return Err(QuantiveError::Http {
                status: response.status,
                url: url.to_string(),
                body: response.body,
            });
        }

        let payload: Value =
            serde_json::from_str(&response.body).map_err(|source| QuantiveError::InvalidJson {
                url: url.to_string(),
                source,
            })?;
        debug!(%url, status = response.status, "Quantive request succeeded");
        Ok(payload)
    }

    pub async fn get_sessions(&self) -> Result<Value> {
        self.get_json(self.endpoint(&["sessions"], &[])?).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Value> {
        self.get_json(self.endpoint(&["sessions", session_id], &[])?)
            .await
    }

    pub async fn get_objectives(&self, session_id: &str) -> Result<Value> {
        self.get_json(self.endpoint(&["goals"], &[("sessionId", session_id)])?)
            .await
    }

    pub async fn get_key_results(&self, objective_id: &str) -> Result<Value> {
        self.get_json(self.endpoint(&["metrics"], &[("goalId", objective_id)])?)
            .await
    }

    /// Typed view of [`get_sessions`](Self::get_sessions).
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        sessions_from_value(self.get_sessions().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantive::transport::testing::RecordingTransport;
    use crate::quantive::transport::RawResponse;
    use serde_json::json;

    const TOKEN: &str = "test-token-0123456789abcdef";
    const ACCOUNT: &str = "acct-42";

    fn client(transport: &Arc<RecordingTransport>) -> QuantiveClient {
        QuantiveClient::with_transport(TOKEN, ACCOUNT, transport.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_urls() {
        let transport = Arc::new(RecordingTransport::new(
            (0..4).map(|_| RawResponse::new(200, "[]")),
        ));
        let client = client(&transport);

        client.get_sessions().await.unwrap();
        client.get_session("sess-1").await.unwrap();
        client.get_objectives("sess-1").await.unwrap();
        client.get_key_results("goal-9").await.unwrap();

        assert_eq!(
            transport.urls(),
            vec![
                format!("{DEFAULT_BASE_URL}/sessions"),
                format!("{DEFAULT_BASE_URL}/sessions/sess-1"),
                format!("{DEFAULT_BASE_URL}/goals?sessionId=sess-1"),
                format!("{DEFAULT_BASE_URL}/metrics?goalId=goal-9"),
            ]
        );
        for (url, headers) in transport.calls() {
            assert_headers(&url, &headers);
        }
    }

    fn assert_headers(url: &str, headers: &header::HeaderMap) {
        assert_eq!(headers.len(), 4, "header count for {url}");
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            &format!("Bearer {TOKEN}"),
            "authorization for {url}"
        );
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
        assert_eq!(headers.get("Gtmhub-AccountId").unwrap(), ACCOUNT);
    }

    #[tokio::test]
    async fn test_body_returned_verbatim() {
        let body = json!({ "items": [{ "id": "g1", "name": "Grow" }], "totalCount": 1 });
        let transport = Arc::new(RecordingTransport::new([
            RawResponse::new(200, body.to_string()),
            RawResponse::new(200, "null"),
            RawResponse::new(204, "[1,2]"),
        ]));
        let client = client(&transport);

        assert_eq!(client.get_objectives("s").await.unwrap(), body);
        assert_eq!(client.get_session("s").await.unwrap(), Value::Null);
        assert_eq!(client.get_sessions().await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        for status in [199, 300, 401, 404, 500] {
            let transport = Arc::new(RecordingTransport::replying(status, "{\"error\":\"x\"}"));
            let err = client(&transport).get_sessions().await.unwrap_err();
            match err {
                QuantiveError::Http { status: got, body, .. } => {
                    assert_eq!(got, status);
                    assert!(body.contains("error"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_json_fails() {
        for body in ["<html>oops</html>", ""] {
            let transport = Arc::new(RecordingTransport::replying(200, body));
            let err = client(&transport).get_key_results("g").await.unwrap_err();
            assert!(matches!(err, QuantiveError::InvalidJson { .. }));
        }
    }

    #[tokio::test]
    async fn test_ids_are_path_encoded() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        client(&transport).get_session("a/b c").await.unwrap();
        assert_eq!(
            transport.urls(),
            vec![format!("{DEFAULT_BASE_URL}/sessions/a%2Fb%20c")]
        );
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let transport = Arc::new(RecordingTransport::new([
            RawResponse::new(503, ""),
            RawResponse::new(200, "[]"),
        ]));
        assert!(client(&transport).get_sessions().await.is_err());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_policy_retries_transient() {
        let transport = Arc::new(RecordingTransport::new([
            RawResponse::new(503, ""),
            RawResponse::new(429, ""),
            RawResponse::new(200, "[]"),
        ]));
        let client = client(&transport).with_retry_policy(RetryPolicy {
            retries: 2,
            ..RetryPolicy::none()
        });

        assert_eq!(client.get_sessions().await.unwrap(), json!([]));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_policy_stops_at_limit_and_skips_client_errors() {
        let transport = Arc::new(RecordingTransport::new([
            RawResponse::new(500, ""),
            RawResponse::new(500, ""),
            RawResponse::new(200, "[]"),
        ]));
        let retrying = client(&transport).with_retry_policy(RetryPolicy {
            retries: 1,
            ..RetryPolicy::none()
        });
        assert!(retrying.get_sessions().await.is_err());
        assert_eq!(transport.calls().len(), 2);

        let transport = Arc::new(RecordingTransport::new([
            RawResponse::new(404, ""),
            RawResponse::new(200, "[]"),
        ]));
        let retrying = client(&transport).with_retry_policy(RetryPolicy {
            retries: 3,
            ..RetryPolicy::none()
        });
        assert!(retrying.get_sessions().await.is_err());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"items":[{"id":"1","name":"Q1"},{"id":"2","name":"Q2"}]}"#,
        ));
        let sessions = client(&transport).list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].name, "Q2");
    }

    #[test]
    fn test_invalid_token_header_rejected() {
        let transport = Arc::new(RecordingTransport::default());
        let err = QuantiveClient::with_transport("bad\ntoken", ACCOUNT, transport)
            .err()
            .unwrap();
        assert!(matches!(err, QuantiveError::InvalidHeader("Authorization")));
    }
}
