use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport failures, pre-classified for the client's retry loop.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Gateway-timeout class: worth retrying the same endpoint.
    #[error("gateway timeout: {0}")]
    Timeout(String),
    /// Throttling/unavailable class: worth rotating to a mirror.
    #[error("endpoint throttled or unavailable: {0}")]
    Unavailable(String),
    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Anything else is fatal and is never retried.
    #[error("transport error: {0}")]
    Other(#[from] anyhow::Error),
}

/// The HTTP seam between the index client and the wire.
///
/// Implemented by [`HttpTransport`] for real gateways and by the
/// testkit's scripted transport for tests, so retry/failover semantics
/// are exercised without a network.
#[async_trait]
pub trait IndexTransport: Send + Sync + std::fmt::Debug {
    /// POST a GraphQL request document to `{endpoint}graphql`.
    async fn post_graphql(&self, endpoint: &Url, body: &Value) -> Result<Value, TransportError>;

    /// GET `{endpoint}{tx_id}` and decode the response as JSON.
    async fn fetch_json(&self, endpoint: &Url, tx_id: &str) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Other(anyhow::Error::new(err)))?;
        Ok(Self { client })
    }

    fn classify_status(status: StatusCode, body: String) -> TransportError {
        match status.as_u16() {
            408 | 504 => TransportError::Timeout(format!("http {status}: {body}")),
            429 | 502 | 503 => TransportError::Unavailable(format!("http {status}: {body}")),
            404 => TransportError::NotFound(body),
            _ => TransportError::Other(anyhow::anyhow!("http {status}: {body}")),
        }
    }

    fn classify_send_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Unavailable(err.to_string())
        } else {
            TransportError::Other(anyhow::Error::new(err))
        }
    }

    fn join(endpoint: &Url, path: &str) -> Result<Url, TransportError> {
        endpoint
            .join(path)
            .map_err(|err| TransportError::Other(anyhow::Error::new(err)))
    }
}

#[async_trait]
impl IndexTransport for HttpTransport {
    async fn post_graphql(&self, endpoint: &Url, body: &Value) -> Result<Value, TransportError> {
        let url = Self::join(endpoint, "graphql")?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| TransportError::Other(anyhow::Error::new(err)))
    }

    async fn fetch_json(&self, endpoint: &Url, tx_id: &str) -> Result<Value, TransportError> {
        let url = Self::join(endpoint, tx_id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| TransportError::Other(anyhow::Error::new(err)))
    }
}
