use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Url};
use tracing::trace;

use crate::shared::error::Result;

/// Status and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues GET requests on behalf of [`QuantiveClient`](super::QuantiveClient).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<RawResponse>;
}

pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("quantive-okr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<RawResponse> {
        trace!(%url, "sending GET");
        let response = self
            .http
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}
