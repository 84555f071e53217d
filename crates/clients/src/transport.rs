//! HTTP transport seam
//!
//! Clients speak JSON to named platform services through [`HttpClient`].
//! Authentication, retries and timeouts belong to the implementation.

use async_trait::async_trait;
use platform_core::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Query string parameters, in order; keys may repeat
pub type Query = Vec<(String, String)>;

/// Async JSON transport to platform services
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `endpoint` on `service` and return the decoded JSON body
    async fn get(&self, service: &str, endpoint: &str, query: &[(String, String)]) -> Result<Value>;

    /// POST a JSON `body` to `endpoint` on `service` and return the decoded JSON body
    async fn post(&self, service: &str, endpoint: &str, body: &Value) -> Result<Value>;
}

/// Decode a response body into a wire model, mapping failures to `Error::Schema`
pub(crate) fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    Ok(serde_json::from_value(body)?)
}
