//! HTTP client transport using reqwest.

use async_trait::async_trait;
use simplerpc::{ClientTransport, HttpConfig, JsonRpcRequest, JsonRpcResponse, Result, RpcError};
use std::time::Duration;
use tracing::debug;

/// Sends each request as one HTTP POST and decodes the body as a response.
///
/// The HTTP status is not interpreted: a 400 from the server still carries a
/// JSON-RPC error response, which is returned like any other. Only a body
/// that does not decode as a response is a transport error.
#[derive(Debug, Clone)]
pub struct HttpClientTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpClientTransport {
    /// Create a transport posting to `url` with the default request timeout.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, HttpConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(HttpConfig::USER_AGENT)
            .build()
            .map_err(|e| RpcError::transport("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ClientTransport for HttpClientTransport {
    async fn send_and_receive(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| RpcError::transport(format!("POST {} failed", self.url), e))?;

        let status = response.status();
        debug!("POST {} -> {} for id {:?}", self.url, status, request.id);

        let body = response
            .bytes()
            .await
            .map_err(|e| RpcError::transport("failed to read response body", e))?;

        serde_json::from_slice(&body).map_err(|e| {
            RpcError::transport(format!("undecodable response body (HTTP {})", status), e)
        })
    }
}
