//! `reqwest`-backed [`HttpClient`]

use async_trait::async_trait;
use platform_core::{Error, Result, SdkConfig};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::HttpClient;

/// HTTP transport resolving services as `{protocol}://{service}.{domain}`
///
/// Credentials are not managed here: callers needing authentication build
/// a `reqwest::Client` with the appropriate default headers and pass it to
/// [`ReqwestHttpClient::with_client`].
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    config: SdkConfig,
}

impl ReqwestHttpClient {
    /// Create a transport with a fresh `reqwest::Client`
    pub fn new(config: SdkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    /// Create a transport around a preconfigured `reqwest::Client`
    pub fn with_client(client: Client, config: SdkConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    fn url(&self, service: &str, endpoint: &str) -> String {
        format!("{}{}", self.config.service_url(service), endpoint)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| Error::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| Error::Transport {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[instrument(skip(self, query), fields(transport = "reqwest"))]
    async fn get(&self, service: &str, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url(service, endpoint);
        debug!(%url, params = query.len(), "GET");
        self.send(self.client.get(&url).query(query)).await
    }

    #[instrument(skip(self, body), fields(transport = "reqwest"))]
    async fn post(&self, service: &str, endpoint: &str, body: &Value) -> Result<Value> {
        let url = self.url(service, endpoint);
        debug!(%url, "POST");
        self.send(self.client.post(&url).json(body)).await
    }
}
